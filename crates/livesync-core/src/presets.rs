//! Entity presets for the dashboard's synchronized entity types.
//!
//! Only announcements carry client-only state (the `read` flag), so they
//! are the only preset using [`MergePolicy::FieldPreservingMerge`]. Any
//! other entity that gains client-only fields opts in the same way.

use crate::config::EntityConfig;
use crate::reconcile::MergePolicy;

fn preset(entity: &str, plural: &str, hint: &[&str]) -> EntityConfig {
    EntityConfig::new(entity)
        .with_subscription_field(format!("subscribeToCalc{plural}"))
        .with_shape_hint(hint.iter().copied())
}

impl EntityConfig {
    pub fn contacts() -> Self {
        preset("Contact", "Contacts", &["first_name", "last_name", "email"])
    }

    pub fn properties() -> Self {
        preset("Property", "Properties", &["property_name", "address_1", "suburb_town"])
    }

    pub fn jobs() -> Self {
        preset("Job", "Jobs", &["job_status", "job_total", "property_id"])
    }

    pub fn activities() -> Self {
        preset("Activity", "Activities", &["task", "activity_status", "date_required"])
    }

    pub fn materials() -> Self {
        preset("Material", "Materials", &["material_name", "quantity", "total"])
    }

    pub fn appointments() -> Self {
        preset("Appointment", "Appointments", &["start_time", "appointment_status", "location_id"])
    }

    pub fn uploads() -> Self {
        preset("Upload", "Uploads", &["file_upload", "photo_upload", "upload_type"])
    }

    /// Announcements keep the client-side `read` flag across live updates.
    pub fn announcements() -> Self {
        preset("Announcement", "Announcements", &["title", "content", "publish_date_time"])
            .with_policy(MergePolicy::FieldPreservingMerge)
            .with_protected_fields(["read"])
    }
}
