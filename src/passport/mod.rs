pub mod compose;
pub mod export;
pub mod flatten;
pub mod router;
pub mod search;
pub mod tabular;
pub mod view;

use serde_json::Value;
use url::Url;

use compose::ComposedPassport;
use tabular::IndexRecord;
use view::PassportView;

/// A resolved unit with both source documents and their composition.
#[derive(Debug, Clone)]
pub struct LoadedPassport {
    pub location: Url,
    pub site_base: Url,
    pub record: IndexRecord,
    pub unit: Option<Value>,
    pub model: Option<Value>,
    pub composed: ComposedPassport,
}

impl LoadedPassport {
    /// Flatten every section of the composition into a renderable view.
    pub fn view(&self) -> PassportView {
        view::build_view(&self.record, &self.composed, &self.site_base)
    }
}
