//! Zigsense routing
//!
//! Turns decoded wire records into normalized [`Reading`]s. The datapoint
//! path resolves vendor id reuse through an ordered [`RoutingPolicy`]; the
//! standard cluster path maps well-known ZCL attributes directly.

pub mod attribute;
pub mod error;
pub mod policy;
pub mod profile;
pub mod reading;
pub mod router;
pub mod semantic;

pub use attribute::{route_attribute, route_attributes, route_zone_status};
pub use error::{RouteError, RouteKey};
pub use policy::{PolicyError, RoutingPolicy, VoltageUnit};
pub use profile::{DeviceProfile, TEMPERATURE_CAPABILITY};
pub use reading::Reading;
pub use router::{classify, route};
pub use semantic::Semantic;
