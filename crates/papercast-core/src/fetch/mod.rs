//! Remote content collaborators.
//!
//! Failure policy per collaborator:
//! - [`crossref::MetadataResolver`] returns `Result<Metadata, ResolveError>`;
//!   the pipeline logs the error and skips the item.
//! - [`scrape::WebScraper`] never fails; any error becomes an empty string.

pub mod crossref;
pub mod scrape;

/// User-Agent sent on every outbound request.
pub(crate) fn user_agent(mailto: Option<&str>) -> String {
    match mailto {
        Some(email) => format!("papercast/{} (mailto:{})", env!("CARGO_PKG_VERSION"), email),
        None => format!("papercast/{}", env!("CARGO_PKG_VERSION")),
    }
}
