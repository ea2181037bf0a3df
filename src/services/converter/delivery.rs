use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::bot::error::Error;
use crate::constants::timeouts::INTERACTION_TOKEN_TTL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryRoute {
    /// Edit the original interaction reply
    InteractionReply,
    DirectMessage,
    /// The channel the command was used in
    Channel,
}

impl DeliveryRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryRoute::InteractionReply => "interaction reply",
            DeliveryRoute::DirectMessage => "direct message",
            DeliveryRoute::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub content: String,
    pub file: Option<PathBuf>,
}

/// Something that can carry a result over each route
#[async_trait]
pub trait DeliveryTarget: Send + Sync {
    async fn send(&self, route: DeliveryRoute, delivery: &Delivery) -> Result<(), Error>;
}

/// Routes to try, in order, given how long ago the interaction started
pub fn routes(elapsed: Duration) -> Vec<DeliveryRoute> {
    let mut routes = Vec::with_capacity(3);
    if elapsed < INTERACTION_TOKEN_TTL {
        routes.push(DeliveryRoute::InteractionReply);
    }
    routes.push(DeliveryRoute::DirectMessage);
    routes.push(DeliveryRoute::Channel);
    routes
}

/// Try each route until one works. The last error is returned if none do.
pub async fn deliver<T: DeliveryTarget + ?Sized>(
    target: &T,
    elapsed: Duration,
    delivery: &Delivery,
) -> Result<DeliveryRoute, Error> {
    let mut last_error = None;

    for route in routes(elapsed) {
        match target.send(route, delivery).await {
            Ok(()) => {
                info!("Delivered conversion result via {}", route.as_str());
                return Ok(route);
            }
            Err(e) => {
                warn!("Delivery via {} failed: {}", route.as_str(), e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::custom("no delivery route available")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        failing: Vec<DeliveryRoute>,
        tried: Mutex<Vec<DeliveryRoute>>,
    }

    impl Recorder {
        fn failing(routes: &[DeliveryRoute]) -> Self {
            Self {
                failing: routes.to_vec(),
                tried: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DeliveryTarget for Recorder {
        async fn send(&self, route: DeliveryRoute, _: &Delivery) -> Result<(), Error> {
            self.tried.lock().unwrap().push(route);
            if self.failing.contains(&route) {
                Err(Error::custom(format!("{} unavailable", route.as_str())))
            } else {
                Ok(())
            }
        }
    }

    fn delivery() -> Delivery {
        Delivery {
            content: "done".to_string(),
            file: None,
        }
    }

    #[tokio::test]
    async fn test_reply_while_token_valid() {
        let target = Recorder::failing(&[]);
        let route = deliver(&target, Duration::from_secs(60), &delivery()).await.unwrap();
        assert_eq!(route, DeliveryRoute::InteractionReply);
    }

    #[tokio::test]
    async fn test_expired_token_goes_to_dm() {
        let target = Recorder::failing(&[]);
        let route = deliver(&target, Duration::from_secs(16 * 60), &delivery()).await.unwrap();

        assert_eq!(route, DeliveryRoute::DirectMessage);
        assert_eq!(*target.tried.lock().unwrap(), vec![DeliveryRoute::DirectMessage]);
    }

    #[tokio::test]
    async fn test_falls_back_to_channel() {
        let target = Recorder::failing(&[DeliveryRoute::InteractionReply, DeliveryRoute::DirectMessage]);
        let route = deliver(&target, Duration::from_secs(1), &delivery()).await.unwrap();

        assert_eq!(route, DeliveryRoute::Channel);
        assert_eq!(
            *target.tried.lock().unwrap(),
            vec![
                DeliveryRoute::InteractionReply,
                DeliveryRoute::DirectMessage,
                DeliveryRoute::Channel
            ]
        );
    }

    #[tokio::test]
    async fn test_all_routes_failing() {
        let target = Recorder::failing(&[
            DeliveryRoute::InteractionReply,
            DeliveryRoute::DirectMessage,
            DeliveryRoute::Channel,
        ]);
        let err = deliver(&target, Duration::ZERO, &delivery()).await.unwrap_err();
        assert!(err.to_string().contains("channel unavailable"));
    }
}
