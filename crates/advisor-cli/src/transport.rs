//! Terminal transport
//!
//! Delivers messages to the interactive session. The scheduler uses the
//! same path, so unattended reports show up inline.

use advisor_core::{Result, Transport};
use async_trait::async_trait;

pub struct StdoutTransport;

#[async_trait]
impl Transport for StdoutTransport {
    async fn send(&self, user_id: i64, message: &str) -> Result<()> {
        println!("\n[advisor -> user {user_id}]\n{message}\n");
        Ok(())
    }
}
