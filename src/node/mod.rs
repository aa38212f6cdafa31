//! Object node: local storage wired to placement and the location registry

pub mod server;

pub use server::{
    ClusterStatus, DeleteOutcome, InfoOutcome, ObjectFetch, ObjectInfo, ObjectNode, PutOutcome,
    StoredObject,
};
