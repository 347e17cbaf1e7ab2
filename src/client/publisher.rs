use serde_json::Value;

use super::RachClient;
use crate::error::ClientResult;

/// Право публикации в один топик, полученное через
/// [`RachClient::add_publisher`].
#[derive(Clone)]
pub struct Publisher {
    client: RachClient,
    topic: String,
}

impl Publisher {
    pub(crate) fn new(
        client: RachClient,
        topic: String,
    ) -> Self {
        Self { client, topic }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publish(
        &self,
        data: Value,
    ) -> ClientResult<()> {
        self.client.publish(&self.topic, data)
    }

    /// Отказывается от права публикации.
    pub async fn close(self) -> ClientResult<()> {
        self.client.remove_publisher(&self.topic).await
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic)
            .finish()
    }
}
