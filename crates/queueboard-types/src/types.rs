//! Vehicle queue, plant and session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One weighted input to a vehicle's queue score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor_id: i64,

    #[serde(default)]
    pub name: String,

    /// Sort key, ascending = more important
    #[serde(default)]
    pub priority: i64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,

    /// Raw measured value (job count, mileage, minutes...)
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub value: Option<f64>,

    /// Weighted contribution to the overall score
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub factor_score: Option<f64>,
}

/// Ranked vehicle as returned by `/vehicle/priority`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default)]
    pub id: i64,

    /// 1-based queue position
    #[serde(default)]
    pub rank: u32,

    /// Display label (fleet number)
    #[serde(default, deserialize_with = "lenient_string")]
    pub item: String,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub priority: bool,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub important: bool,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub compensated: bool,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "lenient_vec")]
    pub raw_score: Vec<FactorScore>,

    #[serde(default, deserialize_with = "lenient_vec")]
    pub message_data: Vec<Value>,

    #[serde(default)]
    pub vehicle_number: Option<String>,

    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub load_capacity: Option<f64>,

    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub feedback_qty: Option<f64>,

    #[serde(default)]
    pub available_since: Option<String>,

    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub job_count: Option<f64>,

    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub mileage: Option<f64>,

    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub job_qty: Option<f64>,

    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub job_hours: Option<f64>,
}

impl Vehicle {
    /// Label used in the queue table
    pub fn label(&self) -> String {
        if !self.item.is_empty() {
            self.item.clone()
        } else {
            format!("Vehicle {}", self.rank)
        }
    }

    /// Raw score entry at a fixed position in the server's factor list
    pub fn raw_value_at(&self, index: usize) -> Option<f64> {
        self.raw_score.get(index).and_then(|f| f.value)
    }

    /// Whether this row is the vehicle with the given fleet number
    pub fn has_vehicle_number(&self, vehicle_number: &str) -> bool {
        !vehicle_number.is_empty() && self.vehicle_number.as_deref() == Some(vehicle_number)
    }

    /// Legend categories this vehicle belongs to
    pub fn categories(&self) -> Vec<LegendCategory> {
        let mut categories = Vec::new();
        if self.important {
            categories.push(LegendCategory::ImmediateAttention);
        }
        if self.priority {
            categories.push(LegendCategory::Priority);
        }
        if self.compensated {
            categories.push(LegendCategory::Compensate);
        }
        if categories.is_empty() && self.rank == 1 {
            categories.push(LegendCategory::Recommendation);
        }
        categories
    }
}

/// Legend categories shown above the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegendCategory {
    ImmediateAttention,
    Recommendation,
    Priority,
    Compensate,
}

impl LegendCategory {
    pub const ALL: [LegendCategory; 4] = [
        LegendCategory::ImmediateAttention,
        LegendCategory::Recommendation,
        LegendCategory::Priority,
        LegendCategory::Compensate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LegendCategory::ImmediateAttention => "Immediate Attention",
            LegendCategory::Recommendation => "Recommendation",
            LegendCategory::Priority => "Priority",
            LegendCategory::Compensate => "Compensate",
        }
    }
}

impl std::fmt::Display for LegendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Batching plant (zone) the queue is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPlant")]
pub struct Plant {
    #[serde(rename = "ZoneID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,
}

/// Zone directory entry; `ZoneID` is preferred, `ID` is the fallback
#[derive(Deserialize)]
struct RawPlant {
    #[serde(rename = "ZoneID", default)]
    zone_id: Value,
    #[serde(rename = "ID", default)]
    id: Value,
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

impl TryFrom<RawPlant> for Plant {
    type Error = String;

    fn try_from(raw: RawPlant) -> Result<Self, Self::Error> {
        let id = value_as_id(&raw.zone_id)
            .or_else(|| value_as_id(&raw.id))
            .ok_or_else(|| "plant has neither ZoneID nor ID".to_string())?;
        Ok(Plant {
            id,
            name: raw.name.unwrap_or_default(),
        })
    }
}

impl Plant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Notification delivered on a push channel. The payload is kept for
/// logging only; receivers always refetch instead of trusting it.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub channel: String,
    pub event: String,
    pub data: Value,
}

/// Account details stored alongside the session keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// `<serviceCode>:<user>` composite identifier
    #[serde(rename = "UserIDEx", default, skip_serializing_if = "Option::is_none")]
    pub user_id_ex: Option<String>,

    #[serde(rename = "CompanyID", default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Value>,

    #[serde(rename = "Role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authenticated session as persisted under the `atss_auth` key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthData {
    #[serde(rename = "JwtToken", default, skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,

    #[serde(rename = "RefreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(rename = "ApiKey", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(rename = "ServiceCode", default, skip_serializing_if = "Option::is_none")]
    pub service_code: Option<String>,

    #[serde(rename = "userInfo", default)]
    pub user_info: UserInfo,

    #[serde(rename = "loginTime", default, skip_serializing_if = "Option::is_none")]
    pub login_time: Option<DateTime<Utc>>,
}

/// Legacy service code that the account service still hands out for SGP
const LEGACY_SERVICE_CODE: &str = "Default";
/// Role allowed to change display settings
pub const OPERATOR_ROLE: &str = "Operator";
const NORMALIZED_SERVICE_CODE: &str = "SGP";

impl AuthData {
    /// Rewrite the legacy `Default` service code to `SGP`, including the
    /// prefix of `UserIDEx`
    pub fn normalized(mut self) -> Self {
        if self.service_code.as_deref() == Some(LEGACY_SERVICE_CODE) {
            self.service_code = Some(NORMALIZED_SERVICE_CODE.to_string());
        }
        if let Some(ref id) = self.user_info.user_id_ex {
            let (prefix, rest) = match id.split_once(':') {
                Some((prefix, rest)) => (prefix, Some(rest)),
                None => (id.as_str(), None),
            };
            let prefix = if prefix == LEGACY_SERVICE_CODE {
                NORMALIZED_SERVICE_CODE
            } else {
                prefix
            };
            self.user_info.user_id_ex = Some(match rest {
                Some(rest) => format!("{}:{}", prefix, rest),
                None => prefix.to_string(),
            });
        }
        self
    }

    fn user_id_prefix(&self) -> Option<&str> {
        self.user_info
            .user_id_ex
            .as_deref()
            .and_then(|id| id.split(':').next())
            .filter(|p| !p.is_empty())
    }

    /// Service code used for defaults and live-channel topics.
    /// Falls back to the `UserIDEx` prefix.
    pub fn effective_service_code(&self) -> Option<&str> {
        self.service_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .or_else(|| self.user_id_prefix())
    }

    /// Value for the `Instance` request header
    pub fn instance(&self) -> Option<&str> {
        self.user_id_prefix()
            .or_else(|| self.service_code.as_deref().filter(|c| !c.is_empty()))
    }

    pub fn role(&self) -> Option<&str> {
        self.user_info.role.as_deref()
    }

    pub fn is_operator(&self) -> bool {
        self.role() == Some(OPERATOR_ROLE)
    }

    /// Fleet number of the vehicle a driver session belongs to
    pub fn vehicle_number(&self) -> Option<&str> {
        self.user_info
            .vehicle_number
            .as_deref()
            .filter(|n| !n.is_empty())
    }
}

// Lenient field decoding: the ranking endpoint mixes numbers, numeric strings
// and nulls for the same field across deployments.

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_decodes_server_shape() {
        let json = r#"{
            "id": 279482, "rank": 4, "item": "9018", "score": 0,
            "priority": true, "compensated": true, "trial_mix": null,
            "message_data": [], "load_capacity": 9,
            "raw_score": [
                {"factor_id": 6, "name": "Trial Mix", "priority": 7, "score": 5, "factor_score": 0.7143},
                {"factor_id": 18, "name": "Assigned Jobs", "priority": 9, "score": 3, "factor_score": 0.3333, "value": 2}
            ],
            "available_since": null
        }"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.rank, 4);
        assert_eq!(vehicle.label(), "9018");
        assert!(vehicle.priority);
        assert!(vehicle.compensated);
        assert!(!vehicle.important);
        assert_eq!(vehicle.raw_score.len(), 2);
        assert_eq!(vehicle.raw_score[1].value, Some(2.0));
        assert_eq!(vehicle.raw_score[0].value, None);
        assert_eq!(vehicle.load_capacity, Some(9.0));
    }

    #[test]
    fn test_vehicle_categories() {
        let top = Vehicle {
            rank: 1,
            ..Default::default()
        };
        assert_eq!(top.categories(), vec![LegendCategory::Recommendation]);

        let flagged = Vehicle {
            rank: 1,
            important: true,
            priority: true,
            ..Default::default()
        };
        assert_eq!(
            flagged.categories(),
            vec![LegendCategory::ImmediateAttention, LegendCategory::Priority]
        );

        let plain = Vehicle {
            rank: 3,
            ..Default::default()
        };
        assert!(plain.categories().is_empty());
    }

    #[test]
    fn test_role_and_own_vehicle() {
        let driver = AuthData {
            user_info: UserInfo {
                role: Some("Driver".to_string()),
                vehicle_number: Some("9131".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!driver.is_operator());
        assert_eq!(driver.vehicle_number(), Some("9131"));

        let operator = AuthData {
            user_info: UserInfo {
                role: Some(OPERATOR_ROLE.to_string()),
                vehicle_number: Some(String::new()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(operator.is_operator());
        assert_eq!(operator.vehicle_number(), None);

        let own = Vehicle {
            vehicle_number: Some("9131".to_string()),
            ..Default::default()
        };
        assert!(own.has_vehicle_number("9131"));
        assert!(!own.has_vehicle_number("9018"));
        assert!(!Vehicle::default().has_vehicle_number(""));
    }

    #[test]
    fn test_plant_accepts_numeric_zone_id() {
        let plant: Plant = serde_json::from_str(r#"{"ZoneID": 7, "ID": 3, "Name": "SK"}"#).unwrap();
        assert_eq!(plant.id, "7");
        assert_eq!(plant.name, "SK");

        let plant: Plant = serde_json::from_str(r#"{"ID": "12"}"#).unwrap();
        assert_eq!(plant.id, "12");

        assert!(serde_json::from_str::<Plant>(r#"{"Name": "nowhere"}"#).is_err());
    }

    #[test]
    fn test_auth_normalizes_legacy_service_code() {
        let auth = AuthData {
            service_code: Some("Default".to_string()),
            user_info: UserInfo {
                user_id_ex: Some("Default:driver01".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
        .normalized();

        assert_eq!(auth.service_code.as_deref(), Some("SGP"));
        assert_eq!(auth.user_info.user_id_ex.as_deref(), Some("SGP:driver01"));
        assert_eq!(auth.instance(), Some("SGP"));
    }

    #[test]
    fn test_service_code_falls_back_to_user_id_prefix() {
        let auth = AuthData {
            user_info: UserInfo {
                user_id_ex: Some("ICPL:ops".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(auth.effective_service_code(), Some("ICPL"));
    }
}
