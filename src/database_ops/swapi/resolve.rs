use futures::future::try_join_all;
use itertools::Itertools;
use serde_json::Value;

use super::client::CatalogFetch;
use crate::errors::IngestError;

/// A record field pointing at other catalog resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceField {
    Absent,
    SingleUrl(String),
    UrlList(Vec<String>),
}

impl ReferenceField {
    /// Classifies a raw field value. Non-string scalars carry no reference and
    /// count as absent; a list with a non-string entry is malformed.
    /// `record_url` only labels the error.
    pub fn from_value(
        record_url: &str,
        field: &str,
        value: Option<&Value>,
    ) -> Result<Self, IngestError> {
        match value {
            None | Some(Value::Null) => Ok(Self::Absent),
            Some(Value::String(url)) if url.trim().is_empty() => Ok(Self::Absent),
            Some(Value::String(url)) => Ok(Self::SingleUrl(url.clone())),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        IngestError::decode(
                            record_url,
                            format!("field `{field}` holds non-string reference {item}"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::UrlList),
            Some(_) => Ok(Self::Absent),
        }
    }
}

/// `name` if present and non-empty, else `title`, else "".
pub fn display_name(resource: &Value) -> String {
    ["name", "title"]
        .iter()
        .filter_map(|key| resource.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

async fn resolve_url<F>(fetch: &F, url: &str) -> Result<String, IngestError>
where
    F: CatalogFetch + ?Sized,
{
    let resource = fetch.fetch_json(url).await?;
    Ok(display_name(&resource))
}

/// Resolves a reference field into a display string.
///
/// List entries are fetched concurrently but joined in input order, so the
/// result does not depend on which fetch completes first. Entries without a
/// name contribute nothing. One failed fetch fails the whole field.
pub async fn resolve<F>(fetch: &F, field: &ReferenceField) -> Result<String, IngestError>
where
    F: CatalogFetch + ?Sized,
{
    match field {
        ReferenceField::Absent => Ok(String::new()),
        ReferenceField::SingleUrl(url) => resolve_url(fetch, url).await,
        ReferenceField::UrlList(urls) => {
            let names = try_join_all(urls.iter().map(|url| resolve_url(fetch, url))).await?;
            Ok(names.iter().filter(|name| !name.is_empty()).join(", "))
        }
    }
}
