//! Form Module
//!
//! Typed records for every form in the app, each with a pure validation
//! that reports problems per field. Nothing is sent until a form validates.

use std::collections::BTreeMap;
use serde::Serialize;

use crate::api::{ProfileUpdate, RegisterRequest};

/// Validation problems keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem; the first one per field wins
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self.iter().map(|(field, msg)| format!("{field}: {msg}")).collect();
        f.write_str(&lines.join("\n"))
    }
}

const MIN_PASSWORD: usize = 6;
const MAX_NAME: usize = 100;
const MAX_PHONE: usize = 20;
const MAX_ADDRESS: usize = 200;

fn require(errors: &mut FieldErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, "This field is required");
        false
    } else {
        true
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if require(errors, "email", email) && !looks_like_email(email.trim()) {
        errors.add("email", "Enter a valid email address");
    }
}

fn check_name(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if require(errors, field, value) && value.trim().chars().count() > MAX_NAME {
        errors.add(field, format!("Must be at most {MAX_NAME} characters"));
    }
}

fn check_password(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if require(errors, field, value) && value.chars().count() < MIN_PASSWORD {
        errors.add(field, format!("Password must be at least {MIN_PASSWORD} characters"));
    }
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, "first_name", &self.first_name);
        check_name(&mut errors, "last_name", &self.last_name);
        check_email(&mut errors, &self.email);
        check_password(&mut errors, "password", &self.password);
        errors.into_result()
    }

    pub fn request(&self) -> RegisterRequest<'_> {
        RegisterRequest {
            email: self.email.trim(),
            password: &self.password,
            first_name: self.first_name.trim(),
            last_name: self.last_name.trim(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        require(&mut errors, "password", &self.password);
        errors.into_result()
    }
}

/// The four-digit email verification code
#[derive(Debug, Clone, Default)]
pub struct OtpForm {
    pub email: String,
    pub code: String,
}

impl OtpForm {
    pub const LENGTH: usize = 4;

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        let code = self.code.trim();
        if code.len() != Self::LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            errors.add("code", format!("Enter the {}-digit code", Self::LENGTH));
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForgotPasswordForm {
    pub email: String,
}

impl ForgotPasswordForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResetPasswordForm {
    pub email: String,
    pub code: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);

        let code = self.code.trim();
        if !(4..=6).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_digit()) {
            errors.add("code", "Enter the code from your email");
        }

        check_password(&mut errors, "new_password", &self.new_password);
        if self.confirm_password != self.new_password {
            errors.add("confirm_password", "Passwords do not match");
        }
        errors.into_result()
    }
}

/// Dialling codes offered by the phone picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    pub code: &'static str,
    pub name: &'static str,
}

pub static COUNTRIES: [Country; 4] = [
    Country { code: "+234", name: "Nigeria" },
    Country { code: "+1", name: "USA" },
    Country { code: "+44", name: "UK" },
    Country { code: "+233", name: "Ghana" },
];

pub const DEFAULT_COUNTRY_CODE: &str = "+234";

pub fn country_for_code(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.code == code)
}

/// Profile edit form
#[derive(Debug, Clone)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub country_code: String,
    pub phone: String,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            phone: String::new(),
        }
    }
}

impl ProfileForm {
    /// Phone as stored by the server, e.g. `+234 8012345678`
    pub fn full_phone(&self) -> Option<String> {
        let number: String = self.phone.chars().filter(|c| !c.is_whitespace()).collect();
        (!number.is_empty()).then(|| format!("{} {}", self.country_code, number))
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, "first_name", &self.first_name);
        check_name(&mut errors, "last_name", &self.last_name);

        if country_for_code(&self.country_code).is_none() {
            errors.add("country_code", "Unsupported country code");
        }

        if let Some(full) = self.full_phone() {
            let digits = full.split_once(' ').map(|(_, n)| n).unwrap_or_default();
            if !digits.chars().all(|c| c.is_ascii_digit()) {
                errors.add("phone", "Phone number may only contain digits");
            } else if full.len() > MAX_PHONE {
                errors.add("phone", "Phone number is too long");
            }
        }
        errors.into_result()
    }

    pub fn update(&self) -> ProfileUpdate {
        ProfileUpdate {
            first_name: Some(self.first_name.trim().to_string()),
            last_name: Some(self.last_name.trim().to_string()),
            phone: self.full_phone(),
            country: None,
        }
    }
}

/// Intended use of sender access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UseCase {
    FoodDelivery,
    DocumentLogistics,
    EquipmentTransport,
    Other,
}

impl UseCase {
    pub const ALL: [UseCase; 4] = [
        UseCase::FoodDelivery,
        UseCase::DocumentLogistics,
        UseCase::EquipmentTransport,
        UseCase::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            UseCase::FoodDelivery => "Food Delivery",
            UseCase::DocumentLogistics => "Document Logistics",
            UseCase::EquipmentTransport => "Equipment Transport",
            UseCase::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|u| u.label().eq_ignore_ascii_case(label.trim()))
    }
}

/// How often the organisation expects to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Occasional,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Occasional,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Occasional => "Occasional",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.label().eq_ignore_ascii_case(label.trim()))
    }
}

/// Request for sender access
#[derive(Debug, Clone, Default)]
pub struct SenderAccessForm {
    pub org_name: String,
    pub address: String,
    pub use_case: Option<UseCase>,
    pub custom_use_case: String,
    pub frequency: Option<Frequency>,
    pub agrees_device_control: bool,
    pub agrees_terms: bool,
}

/// A validated sender access request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderAccessRequest {
    pub org_name: String,
    pub address: String,
    pub use_case: String,
    pub frequency: Frequency,
}

impl SenderAccessForm {
    pub fn validate(&self) -> Result<SenderAccessRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        require(&mut errors, "org_name", &self.org_name);
        if require(&mut errors, "address", &self.address) && self.address.trim().len() > MAX_ADDRESS {
            errors.add("address", format!("Must be at most {MAX_ADDRESS} characters"));
        }

        let use_case = match self.use_case {
            Some(UseCase::Other) => {
                require(&mut errors, "custom_use_case", &self.custom_use_case);
                self.custom_use_case.trim().to_string()
            }
            Some(use_case) => use_case.label().to_string(),
            None => {
                errors.add("use_case", "Select a use case");
                String::new()
            }
        };

        if !self.agrees_device_control {
            errors.add("agrees_device_control", "Acknowledge device control and usage charges");
        }
        if !self.agrees_terms {
            errors.add("agrees_terms", "Accept the terms of use");
        }

        let Some(frequency) = self.frequency else {
            errors.add("frequency", "Select a frequency");
            return Err(errors);
        };
        errors.into_result()?;

        Ok(SenderAccessRequest {
            org_name: self.org_name.trim().to_string(),
            address: self.address.trim().to_string(),
            use_case,
            frequency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("ada@example.com"));
        assert!(looks_like_email("a.b+c@mail.example.ng"));
        assert!(!looks_like_email("ada@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada@@example.com"));
        assert!(!looks_like_email("ada @example.com"));
        assert!(!looks_like_email("ada@example..com"));
    }

    #[test]
    fn sign_up_reports_every_field() {
        let errors = SignUpForm::default().validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors.get("email"), Some("This field is required"));

        let form = SignUpForm {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            email: "ada@example.com".into(),
            password: "12345".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("password"));
    }

    #[test]
    fn sign_up_request_is_trimmed() {
        let form = SignUpForm {
            first_name: " Ada ".into(),
            last_name: "Obi".into(),
            email: " ada@example.com".into(),
            password: "secret1".into(),
        };
        assert!(form.validate().is_ok());
        let request = form.request();
        assert_eq!(request.first_name, "Ada");
        assert_eq!(request.email, "ada@example.com");
    }

    #[test]
    fn otp_needs_four_digits() {
        let mut form = OtpForm {
            email: "ada@example.com".into(),
            code: "123".into(),
        };
        assert!(form.validate().unwrap_err().contains("code"));
        form.code = "12a4".into();
        assert!(form.validate().is_err());
        form.code = "1234".into();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn reset_password_checks_confirmation() {
        let form = ResetPasswordForm {
            email: "ada@example.com".into(),
            code: "123456".into(),
            new_password: "secret1".into(),
            confirm_password: "secret2".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn profile_phone_combines_country_code() {
        let form = ProfileForm {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            country_code: "+44".into(),
            phone: "7700 900123".into(),
        };
        assert!(form.validate().is_ok());
        assert_eq!(form.update().phone.as_deref(), Some("+44 7700900123"));

        let blank = ProfileForm {
            phone: String::new(),
            ..form.clone()
        };
        assert_eq!(blank.update().phone, None);
    }

    #[test]
    fn profile_rejects_bad_phone_and_country() {
        let form = ProfileForm {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            country_code: "+99".into(),
            phone: "08-01".into(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.contains("country_code"));
        assert!(errors.contains("phone"));

        let long = ProfileForm {
            country_code: "+234".into(),
            phone: "1".repeat(20),
            ..form
        };
        assert_eq!(long.validate().unwrap_err().get("phone"), Some("Phone number is too long"));
    }

    #[test]
    fn sender_access_requires_everything() {
        let errors = SenderAccessForm::default().validate().unwrap_err();
        for field in [
            "org_name",
            "address",
            "use_case",
            "frequency",
            "agrees_device_control",
            "agrees_terms",
        ] {
            assert!(errors.contains(field), "missing {field}");
        }
    }

    #[test]
    fn sender_access_other_needs_description() {
        let mut form = SenderAccessForm {
            org_name: "UNILAG Cafeteria".into(),
            address: "Akoka, Lagos".into(),
            use_case: Some(UseCase::Other),
            custom_use_case: String::new(),
            frequency: Some(Frequency::Weekly),
            agrees_device_control: true,
            agrees_terms: true,
        };
        assert!(form.validate().unwrap_err().contains("custom_use_case"));

        form.custom_use_case = "Lab samples".into();
        let request = form.validate().unwrap();
        assert_eq!(request.use_case, "Lab samples");
        assert_eq!(request.frequency, Frequency::Weekly);
    }

    #[test]
    fn option_labels_parse() {
        assert_eq!(UseCase::from_label("food delivery"), Some(UseCase::FoodDelivery));
        assert_eq!(Frequency::from_label("Occasional"), Some(Frequency::Occasional));
        assert_eq!(Frequency::from_label("hourly"), None);
        assert_eq!(country_for_code("+233").map(|c| c.name), Some("Ghana"));
    }
}
