use crate::error::{ViewerError, ViewerResult};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_POKEMON_API_BASE: &str = "https://pokeapi.co";

#[derive(Debug, Clone, Deserialize)]
pub struct NamedResource {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbilitySlot {
    pub ability: NamedResource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonRecord {
    pub name: String,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
}

impl PokemonRecord {
    /// One `-name` line per ability.
    pub fn abilities_text(&self) -> String {
        self.abilities
            .iter()
            .map(|slot| format!("-{}\n", slot.ability.name))
            .collect()
    }
}

pub struct PokemonClient {
    client: reqwest::Client,
    base_url: String,
}

impl PokemonClient {
    pub fn new() -> ViewerResult<Self> {
        Self::with_base_url(DEFAULT_POKEMON_API_BASE)
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

    pub async fn fetch(&self, name: &str) -> ViewerResult<PokemonRecord> {
        let query = name.trim().to_lowercase();

        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ViewerError::ConfigurationError(format!("Invalid Pokémon API base URL: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ViewerError::ConfigurationError("Pokémon API base URL cannot hold a path".to_string())
            })?
            .pop_if_empty()
            .extend(["api", "v2", "pokemon", query.as_str()]);

        debug!("Fetching Pokémon from {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            error!("Pokémon API returned status {} for '{}'", status, query);
            return Err(ViewerError::NotFound {
                query,
                status: Some(status.as_u16()),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
