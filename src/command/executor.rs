use super::types::CommandKind;
use crate::client::IndexServiceClient;
use crate::client::protocol::*;
use crate::error::{DispatchError, Result};

use std::path::Path;

/// One command bound to one node, run at most once per dispatch.
#[derive(Debug, Clone)]
pub struct Command {
    kind: CommandKind,
    argument: Option<String>,
    client: IndexServiceClient,
}

impl Command {
    pub(crate) fn new(
        kind: CommandKind,
        argument: Option<String>,
        client: IndexServiceClient,
    ) -> Self {
        Self {
            kind,
            argument,
            client,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn client(&self) -> &IndexServiceClient {
        &self.client
    }

    /// Runs the command and returns the server's response body.
    ///
    /// Bulk uploads (`addFile`, `addData`) degrade to one request per line
    /// when the server refuses the whole body; in that case the result is
    /// empty. Transport failures are returned as is.
    pub async fn run(&self) -> Result<String> {
        match self.kind {
            CommandKind::AddFile => {
                let path = self.required_argument()?;
                tracing::info!("adding tsv file: {}", path);
                let bytes = tokio::fs::read(path).await?;
                self.push_with_fallback(decode_lossy(&bytes, path), path).await
            }
            CommandKind::AddData => {
                let chunk = self.required_argument()?.to_string();
                self.push_with_fallback(chunk, "chunk").await
            }
            CommandKind::DeleteAll => self.client.push_update(DELETE_ALL_COMMAND).await,
            CommandKind::Delete => {
                let query = self.required_argument()?;
                self.client.push_update(&delete_by_query(query)).await
            }
            CommandKind::Commit => self.client.push_update(COMMIT_COMMAND).await,
            CommandKind::SoftCommit => self.client.push_update(SOFT_COMMIT_COMMAND).await,
            CommandKind::Optimize => self.client.push_update(OPTIMIZE_COMMAND).await,
            CommandKind::Ping => self.client.ping().await,
            CommandKind::UpdateViaStreamFile => {
                let path = self.required_argument()?;
                tracing::info!("adding tsv file via stream.file: {}", path);
                self.client
                    .push_bulk_via_server_local_file(Path::new(path))
                    .await
            }
        }
    }

    fn required_argument(&self) -> Result<&str> {
        self.argument.as_deref().ok_or_else(|| {
            DispatchError::Argument(format!("command {} requires an argument", self.kind))
        })
    }

    async fn push_with_fallback(&self, body: String, source: &str) -> Result<String> {
        match self.client.push_bulk(body.clone()).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_partial_data() => {
                tracing::warn!("{}", e);
                tracing::warn!("adding {} one by one...", source);
                self.push_line_by_line(&body).await?;
                Ok(String::new())
            }
            Err(e) => {
                tracing::error!("{}", e);
                Err(e)
            }
        }
    }

    /// Sends every data line with the body's header. Refused lines are logged
    /// and skipped.
    async fn push_line_by_line(&self, body: &str) -> Result<()> {
        let mut lines = body.lines();
        let Some(header) = lines.next() else {
            return Ok(());
        };

        for line in lines.filter(|l| !l.is_empty()) {
            match self.client.push_bulk(format!("{}\n{}", header, line)).await {
                Ok(_) => {}
                Err(e) if e.is_transport() => {
                    tracing::error!("{}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    tracing::warn!("skipping invalid line: {}", line);
                }
            }
        }
        Ok(())
    }
}

/// Decodes `bytes` as UTF-8, replacing invalid sequences and warning once.
pub fn decode_lossy(bytes: &[u8], source: &str) -> String {
    let text = String::from_utf8_lossy(bytes);
    if let std::borrow::Cow::Owned(_) = text {
        tracing::warn!("invalid UTF-8 in {} replaced: {}", source, text);
    }
    text.into_owned()
}
