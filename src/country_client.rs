use crate::error::{ViewerError, ViewerResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_COUNTRY_API_BASE: &str = "https://restcountries.com";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryName {
    pub common: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Flags {
    pub png: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Currency {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// One entry of the country API's result array. Only the fields the viewer
/// shows are decoded; everything else in the payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryRecord {
    pub name: Option<CountryName>,
    pub flags: Option<Flags>,
    /// Keyed by ISO currency code. `BTreeMap` keeps the "first currency"
    /// pick stable across runs.
    pub currencies: Option<BTreeMap<String, Currency>>,
    pub capital: Option<Vec<String>>,
    pub region: Option<String>,
}

impl CountryRecord {
    pub fn common_name(&self) -> Option<&str> {
        self.name.as_ref()?.common.as_deref()
    }

    pub fn flag_png_url(&self) -> ViewerResult<&str> {
        self.flags
            .as_ref()
            .and_then(|flags| flags.png.as_deref())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ViewerError::MalformedData("country record has no flags.png".to_string()))
    }

    pub fn currency_label(&self) -> String {
        let first = self
            .currencies
            .as_ref()
            .and_then(|currencies| currencies.iter().next());

        let Some((code, currency)) = first else {
            return "Currency: N/A".to_string();
        };

        let name = currency
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(code);

        match currency.symbol.as_deref() {
            Some(symbol) if !symbol.is_empty() => format!("Currency: {} ({})", name, symbol),
            _ => format!("Currency: {}", name),
        }
    }

    pub fn capital_label(&self) -> String {
        match self.capital.as_deref().and_then(|capitals| capitals.first()) {
            Some(capital) => format!("Capital: {}", capital),
            None => "Capital: N/A".to_string(),
        }
    }

    pub fn region_label(&self) -> String {
        match self.region.as_deref() {
            Some(region) => format!("Region: {}", region),
            None => "Region: N/A".to_string(),
        }
    }
}

pub struct CountryClient {
    client: reqwest::Client,
    base_url: String,
}

impl CountryClient {
    pub fn new() -> ViewerResult<Self> {
        Self::with_base_url(DEFAULT_COUNTRY_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> ViewerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn lookup_url(&self, name: &str) -> ViewerResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ViewerError::ConfigurationError(format!("Invalid country API base URL: {}", e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                ViewerError::ConfigurationError("Country API base URL cannot hold a path".to_string())
            })?
            .pop_if_empty()
            .extend(["v3.1", "name", name]);

        Ok(url)
    }

    /// Looks a country up by name and returns the first match.
    pub async fn fetch_country(&self, name: &str) -> ViewerResult<CountryRecord> {
        let query = name.trim();
        let url = self.lookup_url(query)?;
        debug!("Fetching country record from {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            error!("Country API returned status {} for '{}'", status, query);
            return Err(ViewerError::NotFound {
                query: query.to_string(),
                status: Some(status.as_u16()),
            });
        }

        let body = response.text().await?;
        let matches: Vec<serde_json::Value> = serde_json::from_str(&body).map_err(|e| {
            error!("Country API response is not a JSON array: {}", e);
            ViewerError::MalformedData(format!("Country API response is not a JSON array: {}", e))
        })?;

        let first = matches.into_iter().next().ok_or_else(|| ViewerError::NotFound {
            query: query.to_string(),
            status: None,
        })?;

        Ok(serde_json::from_value(first)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(value: serde_json::Value) -> CountryRecord {
        serde_json::from_value(value).unwrap()
    }

    fn brazil() -> serde_json::Value {
        json!({
            "name": { "common": "Brazil", "official": "Federative Republic of Brazil" },
            "flags": { "png": "https://x/br.png", "svg": "https://x/br.svg" },
            "currencies": { "BRL": { "name": "Brazilian real", "symbol": "R$" } },
            "capital": ["Brasília"],
            "region": "Americas",
            "population": 212559409
        })
    }

    #[test]
    fn test_brazil_labels() {
        let rec = record(brazil());

        assert_eq!(rec.common_name(), Some("Brazil"));
        assert_eq!(rec.flag_png_url().unwrap(), "https://x/br.png");
        assert_eq!(rec.currency_label(), "Currency: Brazilian real (R$)");
        assert_eq!(rec.capital_label(), "Capital: Brasília");
        assert_eq!(rec.region_label(), "Region: Americas");
    }

    #[test]
    fn test_currency_label_fallbacks() {
        assert_eq!(record(json!({})).currency_label(), "Currency: N/A");
        assert_eq!(record(json!({ "currencies": {} })).currency_label(), "Currency: N/A");
        assert_eq!(record(json!({ "currencies": null })).currency_label(), "Currency: N/A");

        let no_symbol = record(json!({ "currencies": { "XYZ": { "name": "Zed", "symbol": "" } } }));
        assert_eq!(no_symbol.currency_label(), "Currency: Zed");

        let no_name = record(json!({ "currencies": { "XYZ": { "symbol": "z" } } }));
        assert_eq!(no_name.currency_label(), "Currency: XYZ (z)");
    }

    #[test]
    fn test_currency_label_picks_first_code() {
        let rec = record(json!({
            "currencies": {
                "USD": { "name": "United States dollar", "symbol": "$" },
                "CHF": { "name": "Swiss franc", "symbol": "Fr." }
            }
        }));
        assert_eq!(rec.currency_label(), "Currency: Swiss franc (Fr.)");
    }

    #[test]
    fn test_capital_and_region_fallbacks() {
        let empty = record(json!({ "capital": [] }));
        assert_eq!(empty.capital_label(), "Capital: N/A");
        assert_eq!(empty.region_label(), "Region: N/A");

        let missing = record(json!({}));
        assert_eq!(missing.capital_label(), "Capital: N/A");

        let many = record(json!({ "capital": ["Pretoria", "Bloemfontein", "Cape Town"] }));
        assert_eq!(many.capital_label(), "Capital: Pretoria");
    }

    #[test]
    fn test_flag_png_url_missing() {
        assert!(matches!(
            record(json!({})).flag_png_url(),
            Err(ViewerError::MalformedData(_))
        ));
        assert!(matches!(
            record(json!({ "flags": { "svg": "https://x/br.svg" } })).flag_png_url(),
            Err(ViewerError::MalformedData(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_country_returns_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.1/name/Brazil"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                brazil(),
                { "name": { "common": "Not Brazil" } }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = CountryClient::with_base_url(server.uri()).unwrap();
        let rec = client.fetch_country("  Brazil \n").await.unwrap();

        assert_eq!(rec.common_name(), Some("Brazil"));
        assert_eq!(rec.currency_label(), "Currency: Brazilian real (R$)");
    }

    #[tokio::test]
    async fn test_fetch_country_encodes_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.1/name/United%20States"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": { "common": "United States" }, "region": "Americas" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = CountryClient::with_base_url(server.uri()).unwrap();
        let rec = client.fetch_country("United States").await.unwrap();
        assert_eq!(rec.region_label(), "Region: Americas");
    }

    #[tokio::test]
    async fn test_fetch_country_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.1/name/Atlantis"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"status\":404}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3.1/name/Nowhere"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = CountryClient::with_base_url(server.uri()).unwrap();

        let err = client.fetch_country("Atlantis").await.unwrap_err();
        assert!(matches!(err, ViewerError::NotFound { status: Some(404), .. }));

        let err = client.fetch_country("Nowhere").await.unwrap_err();
        assert!(matches!(err, ViewerError::NotFound { status: None, .. }));
    }

    #[tokio::test]
    async fn test_fetch_country_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\":\"an array\"}"))
            .mount(&server)
            .await;

        let client = CountryClient::with_base_url(server.uri()).unwrap();
        let err = client.fetch_country("Brazil").await.unwrap_err();
        assert!(matches!(err, ViewerError::MalformedData(_)));
    }
}
