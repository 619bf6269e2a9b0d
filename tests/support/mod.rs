#![allow(dead_code)]

pub mod assertions;

use waitnotify::domain::CorrelationId;

pub fn cid(id: &str) -> CorrelationId {
    CorrelationId::try_new(id).expect("valid correlation id")
}
