//! Authenticated Fyers API client
//!
//! One method per broker operation. Replies are returned as raw JSON and are
//! never interpreted: a reply whose own `s` field says "error" is still `Ok`.
//! Only replies that never arrive, or arrive as something other than JSON,
//! become a [`BrokerError`].

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{BrokerError, BrokerResult, endpoint};
use crate::config::BrokerConfig;

const HISTORY_DEFAULTS: &[(&str, &str)] = &[("date_format", "0"), ("cont_flag", "1")];
const DEPTH_DEFAULTS: &[(&str, &str)] = &[("ohlcv_flag", "1")];
const OPTION_CHAIN_DEFAULTS: &[(&str, &str)] = &[("strikecount", "1"), ("timestamp", "")];

/// Which base URL an endpoint lives under
#[derive(Debug, Clone, Copy)]
enum Api {
    Trade,
    Data,
}

/// Client bound to one credential
pub struct FyersClient {
    http: Client,
    api_base: String,
    data_base: String,
    authorization: HeaderValue,
}

impl std::fmt::Debug for FyersClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FyersClient")
            .field("api_base", &self.api_base)
            .field("data_base", &self.data_base)
            .finish_non_exhaustive()
    }
}

impl FyersClient {
    /// Create a client for `app_id` authenticated with `access_token`
    pub fn new(
        http: Client,
        config: &BrokerConfig,
        app_id: &str,
        access_token: &str,
    ) -> BrokerResult<Self> {
        if access_token.trim().is_empty() {
            return Err(BrokerError::InvalidCredential(
                "access token is empty".to_string(),
            ));
        }
        let mut authorization = HeaderValue::from_str(&format!("{app_id}:{access_token}"))
            .map_err(|e| BrokerError::InvalidCredential(e.to_string()))?;
        authorization.set_sensitive(true);

        Ok(Self {
            http,
            api_base: config.api_base_url.clone(),
            data_base: config.data_base_url.clone(),
            authorization,
        })
    }

    pub async fn profile(&self) -> BrokerResult<Value> {
        self.get(Api::Trade, "/profile", Vec::new()).await
    }

    pub async fn funds(&self) -> BrokerResult<Value> {
        self.get(Api::Trade, "/funds", Vec::new()).await
    }

    pub async fn holdings(&self) -> BrokerResult<Value> {
        self.get(Api::Trade, "/holdings", Vec::new()).await
    }

    pub async fn positions(&self) -> BrokerResult<Value> {
        self.get(Api::Trade, "/positions", Vec::new()).await
    }

    pub async fn tradebook(&self) -> BrokerResult<Value> {
        self.get(Api::Trade, "/tradebook", Vec::new()).await
    }

    /// All orders of the day, or one order when `order_id` is given
    pub async fn orderbook(&self, order_id: Option<&str>) -> BrokerResult<Value> {
        let query = order_id
            .map(|id| vec![("id".to_string(), id.to_string())])
            .unwrap_or_default();
        self.get(Api::Trade, "/orders", query).await
    }

    pub async fn market_status(&self) -> BrokerResult<Value> {
        self.get(Api::Data, "/marketStatus", Vec::new()).await
    }

    pub async fn gtt_orderbook(&self) -> BrokerResult<Value> {
        self.get(Api::Trade, "/gtt/orders", Vec::new()).await
    }

    /// Quotes for a comma-separated symbol list
    pub async fn quotes(&self, symbols: &str) -> BrokerResult<Value> {
        let query = vec![("symbols".to_string(), symbols.to_string())];
        self.get(Api::Data, "/quotes", query).await
    }

    /// Candles; `date_format` and `cont_flag` default to epoch/continuous
    pub async fn history(&self, params: &Value) -> BrokerResult<Value> {
        self.get(Api::Data, "/history", query_from(params, HISTORY_DEFAULTS))
            .await
    }

    pub async fn depth(&self, params: &Value) -> BrokerResult<Value> {
        self.get(Api::Data, "/depth", query_from(params, DEPTH_DEFAULTS))
            .await
    }

    pub async fn option_chain(&self, params: &Value) -> BrokerResult<Value> {
        self.get(
            Api::Data,
            "/options-chain-v3",
            query_from(params, OPTION_CHAIN_DEFAULTS),
        )
        .await
    }

    pub async fn place_order(&self, order: &Value) -> BrokerResult<Value> {
        self.send(Method::POST, "/orders/sync", order).await
    }

    pub async fn modify_order(&self, order: &Value) -> BrokerResult<Value> {
        self.send(Method::PATCH, "/orders/sync", order).await
    }

    pub async fn cancel_order(&self, order: &Value) -> BrokerResult<Value> {
        self.send(Method::DELETE, "/orders/sync", order).await
    }

    pub async fn place_basket_orders(&self, orders: &Value) -> BrokerResult<Value> {
        self.send(Method::POST, "/multi-order/sync", orders).await
    }

    pub async fn modify_basket_orders(&self, orders: &Value) -> BrokerResult<Value> {
        self.send(Method::PATCH, "/multi-order/sync", orders).await
    }

    pub async fn place_multileg_order(&self, order: &Value) -> BrokerResult<Value> {
        self.send(Method::POST, "/multileg/orders/sync", order).await
    }

    pub async fn place_gtt_order(&self, order: &Value) -> BrokerResult<Value> {
        self.send(Method::POST, "/gtt/orders/sync", order).await
    }

    pub async fn modify_gtt_order(&self, order: &Value) -> BrokerResult<Value> {
        self.send(Method::PATCH, "/gtt/orders/sync", order).await
    }

    pub async fn cancel_gtt_order(&self, order: &Value) -> BrokerResult<Value> {
        self.send(Method::DELETE, "/gtt/orders/sync", order).await
    }

    /// Invalidate the access token on the broker side
    pub async fn logout(&self) -> BrokerResult<Value> {
        let url = self.url(Api::Trade, "/logout")?;
        self.call(Method::POST, url, None).await
    }

    fn url(&self, api: Api, path: &str) -> BrokerResult<Url> {
        match api {
            Api::Trade => endpoint(&self.api_base, path),
            Api::Data => endpoint(&self.data_base, path),
        }
    }

    async fn get(&self, api: Api, path: &str, query: Vec<(String, String)>) -> BrokerResult<Value> {
        let mut url = self.url(api, path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        self.call(Method::GET, url, None).await
    }

    async fn send(&self, method: Method, path: &str, body: &Value) -> BrokerResult<Value> {
        let url = self.url(Api::Trade, path)?;
        self.call(method, url, Some(body)).await
    }

    async fn call(&self, method: Method, url: Url, body: Option<&Value>) -> BrokerResult<Value> {
        debug!(%method, path = url.path(), "Calling broker");

        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, self.authorization.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| BrokerError::InvalidResponse {
            status,
            message: format!("{e}; body starts with: {}", preview(&text)),
        })
    }
}

/// Flatten a JSON object into query pairs, filling absent keys from `defaults`
fn query_from(params: &Value, defaults: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = params
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    for (key, value) in defaults {
        if !pairs.iter().any(|(k, _)| k == key) {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FyersClient {
        let config = BrokerConfig {
            api_base_url: format!("{}/api/v3", server.uri()),
            data_base_url: format!("{}/data", server.uri()),
            ..Default::default()
        };
        FyersClient::new(Client::new(), &config, "APP-100", "token-abc").unwrap()
    }

    #[test]
    fn test_new_rejects_empty_token() {
        let err = FyersClient::new(Client::new(), &BrokerConfig::default(), "APP-100", " ")
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidCredential(_)));
    }

    #[test]
    fn test_new_rejects_unencodable_token() {
        let err = FyersClient::new(
            Client::new(),
            &BrokerConfig::default(),
            "APP-100",
            "bad\ntoken",
        )
        .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidCredential(_)));
    }

    #[test]
    fn test_query_from_applies_defaults_without_overriding() {
        let pairs = query_from(
            &json!({"symbol": "NSE:SBIN-EQ", "cont_flag": 0, "skip": null}),
            HISTORY_DEFAULTS,
        );
        assert!(pairs.contains(&("symbol".into(), "NSE:SBIN-EQ".into())));
        assert!(pairs.contains(&("cont_flag".into(), "0".into())));
        assert!(pairs.contains(&("date_format".into(), "0".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "skip"));
    }

    #[tokio::test]
    async fn test_funds_sends_authorization_and_relays_json() {
        let server = MockServer::start().await;
        let reply = json!({"s": "ok", "code": 200, "fund_limit": [{"id": 1, "equityAmount": 1000.5}]});
        Mock::given(method("GET"))
            .and(path("/api/v3/funds"))
            .and(header("authorization", "APP-100:token-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let funds = client_for(&server).funds().await.unwrap();
        assert_eq!(funds, reply);
    }

    #[tokio::test]
    async fn test_error_payload_is_still_ok() {
        let server = MockServer::start().await;
        let reply = json!({"s": "error", "code": -15, "message": "token expired"});
        Mock::given(method("GET"))
            .and(path("/api/v3/profile"))
            .respond_with(ResponseTemplate::new(401).set_body_json(reply.clone()))
            .mount(&server)
            .await;

        let profile = client_for(&server).profile().await.unwrap();
        assert_eq!(profile, reply);
    }

    #[tokio::test]
    async fn test_non_json_reply_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/holdings"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server).holdings().await.unwrap_err();
        assert!(matches!(err, BrokerError::InvalidResponse { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_history_uses_data_api_with_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/history"))
            .and(query_param("symbol", "NSE:SBIN-EQ"))
            .and(query_param("resolution", "5"))
            .and(query_param("date_format", "0"))
            .and(query_param("cont_flag", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"s": "ok", "candles": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params = json!({
            "symbol": "NSE:SBIN-EQ",
            "resolution": "5",
            "range_from": "1700000000",
            "range_to": "1700003600"
        });
        let history = client_for(&server).history(&params).await.unwrap();
        assert_eq!(history["s"], "ok");
    }

    #[tokio::test]
    async fn test_orderbook_passes_order_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/orders"))
            .and(query_param("id", "23080400089344"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"s": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .orderbook(Some("23080400089344"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_modify_gtt_order_uses_patch_with_body() {
        let server = MockServer::start().await;
        let order = json!({"id": "25010700000001", "orderInfo": {"leg1": {"price": 100.0}}});
        Mock::given(method("PATCH"))
            .and(path("/api/v3/gtt/orders/sync"))
            .and(body_json(order.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"s": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).modify_gtt_order(&order).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_transport_error() {
        let config = BrokerConfig {
            api_base_url: "http://127.0.0.1:1/api/v3".to_string(),
            ..Default::default()
        };
        let client = FyersClient::new(Client::new(), &config, "APP-100", "token").unwrap();

        let err = client.positions().await.unwrap_err();
        assert!(matches!(err, BrokerError::Transport(_)));
    }
}
