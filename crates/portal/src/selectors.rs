//! Cascading selector options for the user form.
//!
//! Group choice narrows the companies, company choice narrows the devices.
//! Both lists are derived from the current selection on every call.

use serde::Serialize;

use cardioportal_core::{CompanyId, DomainError, GroupId};

use crate::{Company, Device, Group, ReferenceCatalog, ReferenceSnapshot};

/// Companies of the group identified by `group_code`, ordered by name.
pub fn available_companies<'a>(companies: &'a [Company], group_code: &str) -> Vec<&'a Company> {
    let mut out: Vec<&Company> = companies.iter().filter(|c| c.group_code == group_code).collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// Devices of `company` (matched on company name), ordered by serial.
pub fn available_devices<'a>(devices: &'a [Device], company: &Company) -> Vec<&'a Device> {
    let mut out: Vec<&Device> = devices.iter().filter(|d| d.company_name == company.name).collect();
    out.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorOptions {
    pub groups: Vec<Group>,
    pub companies: Vec<Company>,
    pub devices: Vec<Device>,
}

impl SelectorOptions {
    /// Derive every selector list from the snapshot and the current selection.
    ///
    /// Without a group the company list is empty, and without a company the
    /// device list is empty. A selected id that does not exist is `NotFound`.
    pub fn derive(
        snapshot: &ReferenceSnapshot,
        group_id: Option<GroupId>,
        company_id: Option<CompanyId>,
    ) -> Result<Self, DomainError> {
        let mut groups = snapshot.groups.clone();
        groups.sort_by(|a, b| a.name.cmp(&b.name));

        let companies = match group_id {
            Some(id) => {
                let group = snapshot
                    .group_by_id(id)
                    .ok_or_else(|| DomainError::not_found("group"))?;
                available_companies(&snapshot.companies, &group.code)
                    .into_iter()
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        let devices = match company_id {
            Some(id) => {
                let company = snapshot
                    .company_by_id(id)
                    .ok_or_else(|| DomainError::not_found("company"))?;
                available_devices(&snapshot.devices, company)
                    .into_iter()
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        Ok(Self {
            groups,
            companies,
            devices,
        })
    }
}
