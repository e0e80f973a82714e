use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PollTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}
