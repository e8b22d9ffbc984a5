//! Infrastructure layer - implementations of the domain collaborator traits

pub mod http_api;
pub mod persistence;
pub mod pusher;

pub use http_api::{HttpPlantDirectory, HttpQueueSource};
pub use persistence::StoredSession;
pub use pusher::{PusherClient, PusherConfig};
