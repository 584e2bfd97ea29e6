use std::{fmt, path::Path};

use oauth2::{basic::BasicClient, AuthUrl, Client, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use serde::Deserialize;
use serde_json::Value;

use crate::{AppResult, GetField};

type HappyClient = Client<oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>, oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardTokenIntrospectionResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardRevocableToken, oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>, oauth2::EndpointSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    pub fn id(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    fn path(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google",
            Github => "github",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        use ClientProvider::*;
        match self {
            Google => ("https://accounts.google.com/o/oauth2/auth", "https://oauth2.googleapis.com/token"),
            Github => ("https://github.com/login/oauth/authorize", "https://github.com/login/oauth/access_token"),
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// OAuth clients for each configured provider, plus the Firebase endpoint that
/// turns a provider token into a stable account id.
#[derive(Clone, Default)]
pub struct Clients {
    pub(crate) firebase_idpurl: Option<String>,
    google_client: Option<HappyClient>,
    github_client: Option<HappyClient>,
}

impl Clients {
    /// Reads provider credentials from `path`. A missing file means no
    /// provider is configured.
    pub fn load(path: &Path, base_url: &str) -> AppResult<Clients> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(serde_json::from_str(&text)?, base_url),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no OAuth client file; login is disabled");
                Ok(Clients::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json(json: Value, base_url: &str) -> AppResult<Clients> {
        let firebase_idpurl = format!(
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp?key={}",
            json.get_obj_field("firebase")?.get_str_field("apikey")?
        );

        Ok(
            Clients {
                firebase_idpurl: Some(firebase_idpurl),
                google_client: Self::provider(&json, ClientProvider::Google, base_url)?,
                github_client: Self::provider(&json, ClientProvider::Github, base_url)?,
            }
        )
    }

    fn provider(json: &Value, provider: ClientProvider, base_url: &str) -> AppResult<Option<HappyClient>> {
        let Some(json) = json.get(provider.path()) else {
            return Ok(None);
        };
        let client_id = ClientId::new(json.get_str_field("client_id")?);
        let client_secret = ClientSecret::new(json.get_str_field("client_secret")?);

        let (auth_url, token_url) = provider.endpoints();
        let auth_url = AuthUrl::new(auth_url.to_owned())?;
        let token_url = TokenUrl::new(token_url.to_owned())?;
        let redirect_url = RedirectUrl::new(format!("{}/lockin/{}", base_url.trim_end_matches('/'), provider.path()))?;

        Ok(Some(
            BasicClient::new(client_id)
            .set_client_secret(client_secret)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
        ))
    }

    pub fn get_client(&self, provider: ClientProvider) -> AppResult<HappyClient> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.clone(),
            Github => self.github_client.clone(),
        }.ok_or(format!("OAuth provider {provider} keys not supplied").into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_listed_providers_are_configured() {
        let clients = Clients::from_json(json!({
            "firebase": { "apikey": "k" },
            "github": { "client_id": "id", "client_secret": "secret" },
        }), "http://localhost:8080/").unwrap();

        assert!(clients.get_client(ClientProvider::Github).is_ok());
        assert!(clients.get_client(ClientProvider::Google).is_err());
        assert_eq!(
            clients.firebase_idpurl.as_deref(),
            Some("https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp?key=k")
        );
    }

    #[test]
    fn firebase_key_is_required() {
        assert!(Clients::from_json(json!({ "github": {} }), "http://x").is_err());
    }

    #[test]
    fn missing_file_disables_login() {
        let dir = tempfile::tempdir().unwrap();
        let clients = Clients::load(&dir.path().join("absent.json"), "http://x").unwrap();
        assert!(clients.get_client(ClientProvider::Google).is_err());
        assert!(clients.firebase_idpurl.is_none());
    }
}
