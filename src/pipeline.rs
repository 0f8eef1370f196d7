use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{PassportError, Result};
use crate::fetch::{fetch_json, Fetch};
use crate::passport::compose::compose;
use crate::passport::router::{extract_uid, match_record, passport_page, resolve_reference, site_base};
use crate::passport::tabular::{self, IndexRecord};
use crate::passport::LoadedPassport;
use crate::settings::index_url;

const UNIT_REFERENCE_COLUMN: &str = "passportJsonUrl";
const MODEL_REFERENCE_KEY: &str = "modelPassportUrl";

/// Fetch and parse the product index.
pub async fn load_index<F: Fetch + ?Sized>(fetcher: &F, url: &Url) -> Result<Vec<IndexRecord>> {
    let text = fetcher.fetch_text(url).await?;
    let records = tabular::parse(&text);
    info!("Loaded {} index records from {}", records.len(), url);
    Ok(records)
}

/// Resolve a page location into a composed passport.
///
/// Steps run strictly in order and the first failure ends the run:
/// location → UID → index → record → unit document → model document → composition.
pub async fn load_passport<F: Fetch + ?Sized>(
    fetcher: &F,
    location: &Url,
    index_path: &str,
) -> Result<LoadedPassport> {
    let uid = extract_uid(location);
    if uid.is_empty() {
        return Err(PassportError::MissingIdentifier);
    }
    debug!(uid = %uid, "Resolved identifier from {}", location);

    let site = site_base(location);
    let page = passport_page(&site)?;

    let records = load_index(fetcher, &index_url(&site, index_path)?).await?;
    let record = match_record(&records, &uid)
        .cloned()
        .ok_or_else(|| PassportError::RecordNotFound(uid.clone()))?;

    let unit = match record.present(UNIT_REFERENCE_COLUMN) {
        Some(reference) => load_document(fetcher, &page, reference).await?,
        None => {
            warn!(uid = %uid, "Index record has no {}", UNIT_REFERENCE_COLUMN);
            None
        }
    };

    let model_reference = unit
        .as_ref()
        .and_then(|u| u.get(MODEL_REFERENCE_KEY))
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty());
    let model = match model_reference {
        Some(reference) => load_document(fetcher, &page, reference).await?,
        None => None,
    };

    let composed = compose(&record, unit.as_ref(), model.as_ref());
    info!(
        uid = %uid,
        unit = unit.is_some(),
        model = model.is_some(),
        events = composed.events.len(),
        "Composed passport"
    );

    Ok(LoadedPassport {
        location: location.clone(),
        site_base: site,
        record,
        unit,
        model,
        composed,
    })
}

/// A document body of `null` counts as no document.
async fn load_document<F: Fetch + ?Sized>(fetcher: &F, page: &Url, reference: &str) -> Result<Option<Value>> {
    let url = resolve_reference(page, reference)?;
    let doc = fetch_json(fetcher, &url).await?;
    Ok(Some(doc).filter(|d| !d.is_null()))
}
