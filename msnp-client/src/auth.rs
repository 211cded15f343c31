//! SSO token acquisition.
//!
//! The notification server answers the first `USR` with a policy string;
//! the client must exchange login name + password + policy for a ticket
//! over HTTPS and submit the ticket in the second `USR`. The exchange is
//! behind a trait so tests (and whatever is left of the live service) can
//! swap implementations.

use async_trait::async_trait;
use msnp_types::core::Email;

use crate::error::{Error, Result};

/// Turns credentials plus the server's policy string into an SSO ticket.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The returned ticket is submitted verbatim as the argument of
    /// `USR ... TWN S`.
    async fn authenticate(&self, login: &Email, password: &str, policy: &str) -> Result<String>;
}

/// The reqwest-backed Passport/Live RST exchange.
#[cfg(feature = "sso")]
#[derive(Debug, Clone)]
pub struct PassportAuthenticator {
    endpoint: String,
    http: reqwest::Client,
}

#[cfg(feature = "sso")]
impl PassportAuthenticator {
    pub const DEFAULT_ENDPOINT: &'static str = "https://login.live.com/RST.srf";

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "sso")]
impl Default for PassportAuthenticator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ENDPOINT)
    }
}

#[cfg(feature = "sso")]
#[async_trait]
impl Authenticator for PassportAuthenticator {
    async fn authenticate(&self, login: &Email, password: &str, policy: &str) -> Result<String> {
        let body = rst_envelope(login.as_str(), password, policy);

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|error| Error::Protocol(format!("SSO request failed: {error}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::BadCredentials);
        }
        if !response.status().is_success() {
            return Err(Error::Protocol(format!(
                "SSO endpoint answered {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|error| Error::Protocol(format!("SSO response unreadable: {error}")))?;

        match extract_ticket(&text) {
            Some(ticket) => Ok(ticket),
            // A well-formed response without a token is the service's way
            // of rejecting the password.
            None if text.contains("wsse:FailedAuthentication") => Err(Error::BadCredentials),
            None => Err(Error::Protocol("SSO response carried no ticket".into())),
        }
    }
}

/// Build the RST request envelope.
#[cfg(feature = "sso")]
fn rst_envelope(login: &str, password: &str, policy: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Envelope xmlns="http://schemas.xmlsoap.org/soap/envelope/"
          xmlns:wsse="http://schemas.xmlsoap.org/ws/2003/06/secext"
          xmlns:wst="http://schemas.xmlsoap.org/ws/2004/04/trust">
  <Header>
    <Security>
      <wsse:UsernameToken Id="user">
        <wsse:Username>{}</wsse:Username>
        <wsse:Password>{}</wsse:Password>
      </wsse:UsernameToken>
    </Security>
  </Header>
  <Body>
    <wst:RequestSecurityToken Id="RST0">
      <wst:RequestType>http://schemas.xmlsoap.org/ws/2004/04/security/trust/Issue</wst:RequestType>
      <wsp:AppliesTo xmlns:wsp="http://schemas.xmlsoap.org/ws/2002/12/policy">
        <wsa:EndpointReference xmlns:wsa="http://schemas.xmlsoap.org/ws/2004/03/addressing">
          <wsa:Address>messenger.msn.com</wsa:Address>
        </wsa:EndpointReference>
      </wsp:AppliesTo>
      <wsse:PolicyReference URI="{}"/>
    </wst:RequestSecurityToken>
  </Body>
</Envelope>"#,
        xml_escape(login),
        xml_escape(password),
        xml_escape(policy),
    )
}

/// Pull the `t=…&p=…` ticket out of the response XML.
///
/// The token sits inside a `BinarySecurityToken` element; `&` arrives as
/// `&amp;`. No XML parser — the shape is fixed and the ticket is opaque.
pub(crate) fn extract_ticket(xml: &str) -> Option<String> {
    let start = xml.find("t=")?;
    let rest = &xml[start..];
    let end = rest.find('<').unwrap_or(rest.len());
    let raw = &rest[..end];

    if !raw.contains("p=") {
        return None;
    }

    Some(raw.replace("&amp;", "&"))
}

pub(crate) fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ticket() {
        let xml = concat!(
            r#"<wsse:BinarySecurityToken Id="PPToken1">"#,
            "t=8rmA8*hu1.p1x&amp;p=8IslA2C5!sW3",
            "</wsse:BinarySecurityToken>",
        );

        assert_eq!(
            extract_ticket(xml).as_deref(),
            Some("t=8rmA8*hu1.p1x&p=8IslA2C5!sW3")
        );
    }

    #[test]
    fn test_extract_ticket_requires_both_halves() {
        assert_eq!(extract_ticket("<x>t=abc</x>"), None);
        assert_eq!(extract_ticket("no token here"), None);
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a&b<c>"), "a&amp;b&lt;c&gt;");
    }
}
