//! `cardioportal-portal`: portal users and reference data, plus the access
//! rules that decide which devices a principal may see.

pub mod model;
pub mod references;
pub mod repo;
pub mod scope;
pub mod selectors;
pub mod service;

pub use model::{Company, Device, DeviceStatus, Group, User};
pub use references::{
    AccessSelection, HydrationWarning, ReferenceCatalog, ReferenceSnapshot, ResolvedAccess,
    UserForm, hydrate_selection, resolve_selection,
};
pub use repo::{PortalStore, StoreError};
pub use scope::{DeviceScope, resolve_scope};
pub use selectors::{SelectorOptions, available_companies, available_devices};
pub use service::{
    CreateUserInput, PortalService, SEARCH_LIMIT, SEARCH_MIN_LEN, ServiceError, UpdateUserInput,
};
