/// A record handed from a partition consumer to the worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub payload: Vec<u8>,
    /// Caller-assigned tag identifying the payload format
    pub type_tag: i32,
}

impl InboundMessage {
    pub fn new(payload: impl Into<Vec<u8>>, type_tag: i32) -> Self {
        Self {
            payload: payload.into(),
            type_tag,
        }
    }
}
