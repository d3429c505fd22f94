use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::error::HttpResult;
use crate::http::RequestDescriptor;

const PROFILES: &str = "/api/butchers/profiles/";
const APPOINTMENTS: &str = "/api/butchers/appointments/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButcherProfile {
    pub id: i64,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    pub city: String,
    #[serde(default)]
    pub district: Option<String>,
    /// Service list as the backend stores it (JSON)
    #[serde(default)]
    pub services: serde_json::Value,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub butcher: i64,
    #[serde(default, alias = "user")]
    pub customer: Option<i64>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub listing: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default)]
    pub animal_count: Option<u32>,
    #[serde(default, alias = "notes")]
    pub note: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Booking request for a butcher's time slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAppointment {
    pub butcher: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal_count: Option<u32>,
}

impl ApiClient {
    pub async fn butcher_profiles(&self) -> HttpResult<Vec<ButcherProfile>> {
        self.fetch_list(RequestDescriptor::get(PROFILES)).await
    }

    pub async fn butcher_profile(&self, id: i64) -> HttpResult<ButcherProfile> {
        self.fetch(RequestDescriptor::get(format!("{}{}/", PROFILES, id)))
            .await
    }

    /// The caller's own profile; 404 when they have none yet
    pub async fn my_butcher_profile(&self) -> HttpResult<ButcherProfile> {
        self.fetch(RequestDescriptor::get(format!("{}me/", PROFILES)))
            .await
    }

    pub async fn create_butcher_profile(
        &self,
        fields: &serde_json::Value,
    ) -> HttpResult<ButcherProfile> {
        self.fetch(RequestDescriptor::post(PROFILES).json_value(fields.clone()))
            .await
    }

    pub async fn update_butcher_profile(
        &self,
        id: i64,
        fields: &serde_json::Value,
    ) -> HttpResult<ButcherProfile> {
        self.fetch(
            RequestDescriptor::patch(format!("{}{}/", PROFILES, id)).json_value(fields.clone()),
        )
        .await
    }

    pub async fn butcher_appointments(&self) -> HttpResult<Vec<Appointment>> {
        self.fetch_list(RequestDescriptor::get(APPOINTMENTS)).await
    }

    pub async fn create_appointment(&self, booking: &NewAppointment) -> HttpResult<Appointment> {
        self.fetch(RequestDescriptor::post(APPOINTMENTS).json(booking)?)
            .await
    }

    pub async fn approve_appointment(&self, id: i64) -> HttpResult<Appointment> {
        self.fetch(RequestDescriptor::post(format!("{}{}/approve/", APPOINTMENTS, id)))
            .await
    }

    pub async fn reject_appointment(&self, id: i64) -> HttpResult<Appointment> {
        self.fetch(RequestDescriptor::post(format!("{}{}/reject/", APPOINTMENTS, id)))
            .await
    }
}
