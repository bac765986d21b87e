/// Who is acting on an invoice, as asserted by the upstream gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub actor_id: Option<String>,
    pub actor_role: Option<String>,
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Context for work the service does on its own behalf.
    pub fn system() -> Self {
        Self {
            actor_id: Some("system".to_string()),
            actor_role: Some("SYSTEM".to_string()),
            request_id: None,
        }
    }
}
