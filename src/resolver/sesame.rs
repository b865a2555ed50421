//! Server-side stand-in for the map widget's name resolution
//!
//! Behaves like the widget's view: `goto_object` returns a pending probe at
//! once and settles it only when the CDS Sesame service answers. Callers
//! therefore go through [`super::settle_and_probe`] exactly as they would with
//! the real widget.

use std::time::Duration;

use async_trait::async_trait;
use nom::{
    bytes::complete::tag,
    character::complete::space1,
    number::complete::double,
    sequence::{preceded, separated_pair},
    IResult,
};
use reqwest::Client;
use url::Url;

use super::name::{SkyView, ViewProbe};
use crate::coordinates::SkyPosition;
use crate::error::LookupError;

/// Public Sesame endpoint
pub const DEFAULT_SESAME_URL: &str = "https://cds.unistra.fr/cgi-bin/nph-sesame";

pub struct SesameView {
    http: Client,
    base_url: String,
    /// Field of view reported once a name resolves
    default_fov: f64,
}

impl SesameView {
    pub fn new(base_url: &str, default_fov: f64, timeout: Duration) -> Result<Self, LookupError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transport {
                identifier: base_url.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_fov,
        })
    }

    fn query_url(&self, name: &str) -> Result<Url, LookupError> {
        let mut url = Url::parse(&format!("{}/-oI/A", self.base_url)).map_err(|e| {
            LookupError::Transport {
                identifier: name.to_string(),
                message: format!("invalid Sesame URL: {}", e),
            }
        })?;
        url.set_query(Some(name));
        Ok(url)
    }
}

/// Query Sesame for a name and extract the J2000 position
async fn query_sesame(http: &Client, url: Url, name: &str) -> Result<SkyPosition, LookupError> {
    let body = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| LookupError::Transport {
            identifier: name.to_string(),
            message: e.to_string(),
        })?
        .text()
        .await
        .map_err(|e| LookupError::Transport {
            identifier: name.to_string(),
            message: e.to_string(),
        })?;

    let (ra, dec) = parse_sesame_position(&body).ok_or_else(|| LookupError::NotFound {
        identifier: name.to_string(),
    })?;
    SkyPosition::new(ra, dec).map_err(|e| LookupError::MalformedResponse {
        identifier: name.to_string(),
        message: e.to_string(),
    })
}

/// First `%J ra dec` line of a Sesame plain-text answer
pub fn parse_sesame_position(body: &str) -> Option<(f64, f64)> {
    body.lines()
        .find_map(|line| j2000_line(line.trim_start()).ok().map(|(_, pair)| pair))
}

fn j2000_line(input: &str) -> IResult<&str, (f64, f64)> {
    preceded(
        tag("%J"),
        preceded(space1, separated_pair(double, space1, double)),
    )(input)
}

#[async_trait]
impl SkyView for SesameView {
    async fn goto_object(&self, name: &str) -> ViewProbe {
        let probe = ViewProbe::pending();
        let url = match self.query_url(name) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(name, error = %err, "Cannot build Sesame query");
                return probe;
            }
        };

        let http = self.http.clone();
        let callback = probe.clone();
        let default_fov = self.default_fov;
        let name = name.to_string();
        tokio::spawn(async move {
            match query_sesame(&http, url, &name).await {
                Ok(position) => callback.settle(position, default_fov).await,
                Err(err) => tracing::warn!(%name, error = %err, "Sesame lookup failed"),
            }
        });
        probe
    }
}
