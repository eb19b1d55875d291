use anyhow::Result;
use async_trait::async_trait;

/// A named capability the Router can pick with `action = tool`.
///
/// Tools take no arguments: the Router only names them. The returned text is
/// shown to the user as-is.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Whether a successful result may be served again from the registry
    /// cache. Off by default; time-dependent tools must leave it off.
    fn cacheable(&self) -> bool {
        false
    }

    async fn invoke(&self) -> Result<String>;
}
