pub mod config;
pub mod extractor;
pub mod funnel;
pub mod origin;
pub mod routing;
pub mod targetologist;

pub use config::{AttributionConfig, TargetologistRule, UtmFieldIds};
pub use extractor::{extract_contact_info, extract_utm, normalize_phone, ContactInfo};
pub use funnel::{determine_product_type, is_prepaid, resolve_funnel, FunnelDetection, ProductType};
pub use origin::{resolve_original_utm, DealLookup, OriginalUtm};
pub use routing::{decide_route, StageFilter};
pub use targetologist::resolve_targetologist;
