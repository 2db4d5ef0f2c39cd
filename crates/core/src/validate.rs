//! Client-side form checks. Every failing field is reported at once and nothing is sent.

use crate::domain::account::{
    ChatRequest, FarmSize, LoginRequest, OtpRequest, PasswordReset, Registration,
};
use crate::domain::records::{
    AnimalImage, AnimalUpdate, FeedEntry, HealthEntry, HealthKind, MilkEntry, NewAnimal,
};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const EMAIL_PATTERN: &str = r"\S+@\S+\.\S+";
const MIN_PASSWORD_LEN: usize = 6;

/// Field name to message, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", joined(.fields))]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    /// Keeps the first message recorded for a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// `field: message` pairs separated by `; `.
fn joined(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn required(errors: &mut ValidationErrors, field: &str, value: &str, message: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, message);
    }
    value.to_string()
}

/// Non-negative finite amount. `invalid` is used for every kind of bad input.
fn amount(errors: &mut ValidationErrors, field: &str, raw: &str, invalid: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        _ => {
            errors.add(field, invalid);
            0.0
        }
    }
}

/// A `YYYY-MM-DD` date that is not after `today`.
fn past_date(errors: &mut ValidationErrors, field: &str, raw: &str, today: NaiveDate) -> NaiveDate {
    match parse_form_date(errors, field, raw) {
        Some(date) if date > today => {
            errors.add(field, "Date cannot be in the future");
            today
        }
        Some(date) => date,
        None => today,
    }
}

fn parse_form_date(errors: &mut ValidationErrors, field: &str, raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.add(field, "Please select a date");
        return None;
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Please enter a valid date (YYYY-MM-DD)");
            None
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// At least six characters with an uppercase letter, a lowercase letter, and a digit.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

fn password_pair(errors: &mut ValidationErrors, password: &str, confirmation: &str) {
    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if !is_strong_password(password) {
        errors.add(
            "password",
            "Password must be at least 6 characters long and contain uppercase, lowercase, and numbers",
        );
    }

    if confirmation.is_empty() {
        errors.add("confirmPassword", "Please confirm your password");
    } else if !password.is_empty() && password != confirmation {
        errors.add("confirmPassword", "Passwords do not match");
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedForm {
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub cost: String,
    pub date_purchased: String,
}

impl FeedForm {
    pub fn validate(&self, today: NaiveDate) -> Result<FeedEntry, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = required(&mut errors, "name", &self.name, "Feed name is required");
        let quantity = amount(
            &mut errors,
            "quantity",
            &self.quantity,
            "Please enter a valid quantity",
        );
        let unit = required(&mut errors, "unit", &self.unit, "Unit is required");
        let cost = amount(&mut errors, "cost", &self.cost, "Please enter a valid cost");
        let date_purchased = past_date(&mut errors, "datePurchased", &self.date_purchased, today);

        errors.into_result(|| FeedEntry {
            name,
            quantity,
            unit,
            cost,
            date_purchased,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MilkForm {
    pub animal_id: String,
    pub morning_milk: String,
    pub evening_milk: String,
    pub date: String,
}

impl MilkForm {
    pub fn validate(&self, today: NaiveDate) -> Result<MilkEntry, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let animal_id = required(
            &mut errors,
            "animalId",
            &self.animal_id,
            "Please select an animal",
        );
        let morning_milk = amount(
            &mut errors,
            "morningMilk",
            &self.morning_milk,
            "Please enter a valid morning milk amount",
        );
        let evening_milk = amount(
            &mut errors,
            "eveningMilk",
            &self.evening_milk,
            "Please enter a valid evening milk amount",
        );
        let date = past_date(&mut errors, "date", &self.date, today);

        errors.into_result(|| MilkEntry {
            animal_id,
            morning_milk,
            evening_milk,
            date,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct AnimalForm {
    pub tag_id: String,
    pub breed: String,
    pub image: Option<ImageFile>,
}

impl AnimalForm {
    pub fn validate(self) -> Result<NewAnimal, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let tag_id = required(&mut errors, "tagId", &self.tag_id, "Tag ID is required");
        let breed = required(&mut errors, "breed", &self.breed, "Breed is required");

        let image = match self.image {
            None => {
                errors.add("image", "Please select an image");
                None
            }
            Some(file) => {
                let mime = mime_guess::from_path(&file.file_name).first();
                match mime {
                    Some(m) if m.type_() == mime_guess::mime::IMAGE => {
                        if file.bytes.len() > MAX_IMAGE_BYTES {
                            errors.add("image", "Image size should be less than 5MB");
                        }
                        Some(AnimalImage {
                            file_name: file.file_name,
                            mime: m.essence_str().to_string(),
                            bytes: file.bytes,
                        })
                    }
                    _ => {
                        errors.add("image", "Please select an image file");
                        None
                    }
                }
            }
        };

        match image {
            Some(image) if errors.is_empty() => Ok(NewAnimal {
                tag_id,
                breed,
                image,
            }),
            _ => Err(errors),
        }
    }
}

pub fn validate_animal_update(update: AnimalUpdate) -> Result<AnimalUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let tag_id = update
        .tag_id
        .map(|t| required(&mut errors, "tagId", &t, "Tag ID cannot be blank"));
    let breed = update
        .breed
        .map(|b| required(&mut errors, "breed", &b, "Breed cannot be blank"));
    if tag_id.is_none() && breed.is_none() {
        errors.add("update", "Nothing to update");
    }
    errors.into_result(|| AnimalUpdate { tag_id, breed })
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = required(&mut errors, "email", &self.email, "Email is required");
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result(|| LoginRequest {
            email,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub farm_name: String,
    pub address: String,
    pub farm_size: String,
    pub farm_size_unit: String,
    pub number_of_cattle: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let email = self.email.trim().to_string();
        if email.is_empty() {
            errors.add("email", "Email is required");
        } else if !is_valid_email(&email) {
            errors.add("email", "Please enter a valid email address");
        }

        password_pair(&mut errors, &self.password, &self.confirm_password);

        let first_name = required(
            &mut errors,
            "firstName",
            &self.first_name,
            "First name is required",
        );
        let last_name = required(
            &mut errors,
            "lastName",
            &self.last_name,
            "Last name is required",
        );
        let farm_name = required(
            &mut errors,
            "farmName",
            &self.farm_name,
            "Farm name is required",
        );
        let address = required(&mut errors, "address", &self.address, "Address is required");

        let farm_size = match self.farm_size.trim() {
            "" => {
                errors.add("farmSize", "Farm size is required");
                0.0
            }
            raw => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() && v > 0.0 => v,
                _ => {
                    errors.add("farmSize", "Farm size must be greater than 0");
                    0.0
                }
            },
        };

        let number_of_cattle = match self.number_of_cattle.trim() {
            "" => {
                errors.add("numberOfCattle", "Number of cattle is required");
                0
            }
            raw => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    errors.add("numberOfCattle", "Number of cattle must be greater than 0");
                    0
                }
            },
        };

        let unit = match self.farm_size_unit.trim() {
            "" => "Acres".to_string(),
            u => u.to_string(),
        };

        errors.into_result(|| Registration {
            email,
            password: self.password.clone(),
            first_name,
            last_name,
            farm_name,
            address,
            farm_size: FarmSize {
                value: farm_size,
                unit,
            },
            number_of_cattle,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct OtpForm {
    pub email: String,
    pub otp: String,
}

impl OtpForm {
    pub fn validate(&self) -> Result<OtpRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = required(&mut errors, "email", &self.email, "Email is required");
        let otp = required(&mut errors, "otp", &self.otp, "Please enter the code");
        errors.into_result(|| OtpRequest { email, otp })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordResetForm {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

impl PasswordResetForm {
    pub fn validate(&self) -> Result<PasswordReset, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let token = required(&mut errors, "token", &self.token, "Reset token is required");
        password_pair(&mut errors, &self.password, &self.confirm_password);
        errors.into_result(|| PasswordReset {
            token,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HealthForm {
    pub kind: HealthKind,
    pub tag_id: String,
    pub date: String,
    pub fields: BTreeMap<String, String>,
}

impl HealthForm {
    pub fn validate(&self) -> Result<HealthEntry, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let tag_id = required(&mut errors, "tagId", &self.tag_id, "Tag ID is required");
        let date_field = self.kind.date_field();
        let date = parse_form_date(&mut errors, date_field, &self.date);

        let allowed = self.kind.detail_fields();
        let mut fields = BTreeMap::new();
        for (name, value) in &self.fields {
            if !allowed.contains(&name.as_str()) {
                errors.add(
                    name,
                    format!(
                        "Unknown field for {} (expected one of: {})",
                        self.kind.title(),
                        allowed.join(", ")
                    ),
                );
                continue;
            }
            fields.insert(name.clone(), value.trim().to_string());
        }
        if let Some(date) = date {
            fields.insert(date_field.to_string(), date.format("%Y-%m-%d").to_string());
        }

        errors.into_result(|| HealthEntry { tag_id, fields })
    }
}

pub fn validate_prompt(prompt: &str) -> Result<ChatRequest, ValidationErrors> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ValidationErrors::single("prompt", "Please enter a prompt"));
    }
    Ok(ChatRequest {
        prompt: prompt.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn feed_form_reports_every_bad_field() {
        let form = FeedForm {
            name: " ".into(),
            quantity: "-3".into(),
            unit: "kgs".into(),
            cost: "abc".into(),
            date_purchased: "2024-06-16".into(),
        };
        let errors = form.validate(today()).unwrap_err();
        assert_eq!(errors.get("name"), Some("Feed name is required"));
        assert_eq!(errors.get("quantity"), Some("Please enter a valid quantity"));
        assert_eq!(errors.get("cost"), Some("Please enter a valid cost"));
        assert_eq!(errors.get("datePurchased"), Some("Date cannot be in the future"));
        assert_eq!(errors.get("unit"), None);
    }

    #[test]
    fn feed_form_builds_entry() {
        let form = FeedForm {
            name: "Dairy meal".into(),
            quantity: "70".into(),
            unit: "kgs".into(),
            cost: "3500".into(),
            date_purchased: "2024-06-15".into(),
        };
        let entry = form.validate(today()).unwrap();
        assert_eq!(entry.quantity, 70.0);
        assert_eq!(entry.date_purchased, today());
    }

    #[test]
    fn milk_form_reports_each_field() {
        let form = MilkForm {
            animal_id: "".into(),
            morning_milk: "".into(),
            evening_milk: "4".into(),
            date: "".into(),
        };
        let errors = form.validate(today()).unwrap_err();
        assert_eq!(errors.get("animalId"), Some("Please select an animal"));
        assert_eq!(
            errors.get("morningMilk"),
            Some("Please enter a valid morning milk amount")
        );
        assert_eq!(errors.get("date"), Some("Please select a date"));
        assert_eq!(errors.get("eveningMilk"), None);
    }

    #[test]
    fn registration_rules() {
        let mut form = RegistrationForm {
            email: "farmer@example".into(),
            password: "weakpass".into(),
            confirm_password: "different".into(),
            first_name: "Amina".into(),
            last_name: "Otieno".into(),
            farm_name: "Green Acres".into(),
            address: "Nakuru".into(),
            farm_size: "0".into(),
            farm_size_unit: "".into(),
            number_of_cattle: "12".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Please enter a valid email address"));
        assert!(errors.get("password").unwrap().starts_with("Password must be"));
        assert_eq!(errors.get("confirmPassword"), Some("Passwords do not match"));
        assert_eq!(errors.get("farmSize"), Some("Farm size must be greater than 0"));

        form.email = "farmer@example.com".into();
        form.password = "Strong1".into();
        form.confirm_password = "Strong1".into();
        form.farm_size = "4.5".into();
        let reg = form.validate().unwrap();
        assert_eq!(reg.farm_size.unit, "Acres");
        assert_eq!(reg.number_of_cattle, 12);
    }

    #[test]
    fn password_strength() {
        assert!(is_strong_password("Abcde1"));
        assert!(!is_strong_password("Abcd1"));
        assert!(!is_strong_password("abcdef1"));
        assert!(!is_strong_password("ABCDEF1"));
        assert!(!is_strong_password("Abcdefg"));
    }

    #[test]
    fn reset_requires_matching_confirmation() {
        let form = PasswordResetForm {
            token: "t".into(),
            password: "Strong1".into(),
            confirm_password: "Strong2".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("confirmPassword"), Some("Passwords do not match"));
    }

    #[test]
    fn animal_image_checks() {
        let form = AnimalForm {
            tag_id: "KE-001".into(),
            breed: "Friesian".into(),
            image: Some(ImageFile {
                file_name: "notes.txt".into(),
                bytes: vec![1, 2, 3],
            }),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("image"), Some("Please select an image file"));

        let form = AnimalForm {
            tag_id: "KE-001".into(),
            breed: "Friesian".into(),
            image: Some(ImageFile {
                file_name: "cow.jpg".into(),
                bytes: vec![0; MAX_IMAGE_BYTES + 1],
            }),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("image"), Some("Image size should be less than 5MB"));

        let form = AnimalForm {
            tag_id: "KE-001".into(),
            breed: "Friesian".into(),
            image: Some(ImageFile {
                file_name: "cow.png".into(),
                bytes: vec![0; 16],
            }),
        };
        let animal = form.validate().unwrap();
        assert_eq!(animal.image.mime, "image/png");
    }

    #[test]
    fn health_form_places_date_under_kind_field() {
        let mut fields = BTreeMap::new();
        fields.insert("result".to_string(), "Positive".to_string());
        let form = HealthForm {
            kind: HealthKind::ReproductiveHealth,
            tag_id: "KE-001".into(),
            date: "2024-05-01".into(),
            fields,
        };
        let entry = form.validate().unwrap();
        assert_eq!(
            entry.fields.get("breedingDate").map(String::as_str),
            Some("2024-05-01")
        );

        let mut fields = BTreeMap::new();
        fields.insert("colour".to_string(), "black".to_string());
        let form = HealthForm {
            kind: HealthKind::Vaccination,
            tag_id: "".into(),
            date: "".into(),
            fields,
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("tagId"), Some("Tag ID is required"));
        assert_eq!(errors.get("date"), Some("Please select a date"));
        assert!(errors.get("colour").is_some());
    }

    #[test]
    fn blank_prompt_is_rejected() {
        assert!(validate_prompt("   ").is_err());
        assert_eq!(validate_prompt(" hi ").unwrap().prompt, "hi");
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("jane@farm.co.ke"));
        assert!(!is_valid_email("jane@farm"));
        assert!(!is_valid_email("jane farm.co"));
        assert!(std::ptr::eq(email_regex(), email_regex()));
    }

    #[test]
    fn validation_errors_travel_as_std_errors() {
        let err: Box<dyn std::error::Error> =
            Box::new(ValidationErrors::single("email", "Email is required"));
        assert_eq!(err.to_string(), "email: Email is required");
        assert!(err.source().is_none());
    }

    #[test]
    fn display_lists_fields_in_order() {
        let mut errors = ValidationErrors::default();
        errors.add("unit", "Unit is required");
        errors.add("cost", "Please enter a valid cost");
        errors.add("cost", "ignored");
        assert_eq!(
            errors.to_string(),
            "cost: Please enter a valid cost; unit: Unit is required"
        );
    }
}
