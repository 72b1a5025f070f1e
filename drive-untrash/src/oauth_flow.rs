use std::io::{BufRead, Write};

use drive_core::{DRIVE_SCOPE, OAuthClient, OAuthToken};
use thiserror::Error;
use url::Url;

const STATE_TOKEN: &str = "state-token";

#[derive(Debug, Error)]
pub enum OAuthFlowError {
    #[error("oauth error: {0}")]
    OAuth(#[from] drive_core::OAuthError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authorization code missing")]
    MissingCode,
}

/// Interactive consent: prints the authorization URL and reads the code
/// back from the terminal.
pub struct OAuthFlow {
    client: OAuthClient,
    redirect_uri: String,
}

impl OAuthFlow {
    pub fn new(client: OAuthClient, redirect_uri: impl Into<String>) -> Self {
        Self {
            client,
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn authorize_url(&self) -> Url {
        self.client
            .authorize_url(&self.redirect_uri, DRIVE_SCOPE, Some(STATE_TOKEN))
    }

    pub async fn authenticate(&self) -> Result<OAuthToken, OAuthFlowError> {
        let url = self.authorize_url();
        let code = {
            let stdin = std::io::stdin();
            prompt_for_code(&url, &mut stdin.lock(), &mut std::io::stderr())?
        };
        Ok(self.client.exchange_code(&code, &self.redirect_uri).await?)
    }
}

fn prompt_for_code(
    url: &Url,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String, OAuthFlowError> {
    writeln!(
        output,
        "Go to the following link in your browser then type the authorization code:\n{url}"
    )?;
    write!(output, "Authorization code: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    extract_code(&line).ok_or(OAuthFlowError::MissingCode)
}

/// Accepts either the bare code or the full redirect URL the browser landed on.
fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        let url = Url::parse(input).ok()?;
        return url
            .query_pairs()
            .find_map(|(key, value)| (key == "code" && !value.is_empty()).then(|| value.into_owned()));
    }
    Some(input.to_string())
}
