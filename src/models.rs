use std::fmt;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use crate::config::TranslationSettings;
use crate::errors::AppResult;
use crate::template_engine::to_data;

/// Allowed deviation from the recommended temperature, degrees Celsius.
pub const VIOLATION_THRESHOLD: f64 = 2.0;

static DATA_URL: OnceLock<Regex> = OnceLock::new();

fn data_url() -> &'static Regex {
    DATA_URL.get_or_init(|| Regex::new(r"data:image/\w+;base64,(.*)").expect("data url pattern is valid"))
}

// ==============================================================================
// FIELD HELPERS
// ==============================================================================

/// Temperature reading. Rendered with an explicit sign and one decimal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Celsius(pub f64);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0.0 {
            write!(f, "0.0")
        } else {
            write!(f, "{:+.1}", self.0)
        }
    }
}

impl Serialize for Celsius {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Celsius {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Celsius)
    }
}

impl Celsius {
    pub fn deviates_from(&self, recommended: Celsius) -> bool {
        (self.0 - recommended.0).abs() > VIOLATION_THRESHOLD
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accepts either a single string or a list of strings.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

/// Trims and lower-cases cargo names, dropping blank entries.
fn normalize_cargo<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(one_or_many(deserializer)?
        .into_iter()
        .map(|cargo| cargo.trim().to_lowercase())
        .filter(|cargo| !cargo.is_empty())
        .collect())
}

fn decode_data_url<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let value = String::deserialize(deserializer)?;
    match data_url().captures(&value) {
        Some(caps) => BASE64.decode(caps[1].trim()).map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusCode {
    Text(String),
    Number(i64),
}

/// Status codes arrive either as `"1"` or as `1`.
fn status_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match StatusCode::deserialize(deserializer)? {
        StatusCode::Text(code) => code.trim().to_string(),
        StatusCode::Number(code) => code.to_string(),
    })
}

fn worked_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match status_code(deserializer)?.as_str() {
        "0" => "Нет/No",
        "1" => "Да/Yes",
        "2" => "Не работал/Did not work",
        "3" => "Работал некорректно/Did not work correctly",
        _ => "",
    }
    .to_string())
}

fn violations_affect_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match status_code(deserializer)?.as_str() {
        "1" => "Нет/Нет\nNo/No",
        "2" => "Да/Нет\nYes/No",
        "3" => "Да/Да\nYes/Yes",
        _ => "",
    }
    .to_string())
}

fn today() -> String {
    Local::now().format("%d.%m.%Y").to_string()
}

/// Keeps the first occurrence of every value, in order.
pub fn distinct<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Upper-cases the first letter and lower-cases the rest.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ==============================================================================
// TEMPERATURE & PHOTOS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    #[serde(deserialize_with = "decode_data_url", skip_serializing, default)]
    pub file: Vec<u8>,
    /// Degrees the photo was turned by; undone on insertion.
    #[serde(default)]
    pub rotation: i32,
}

impl Photo {
    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermometerBoundaries {
    pub min: Celsius,
    pub max: Celsius,
}

impl ThermometerBoundaries {
    pub fn deviates_from(&self, recommended: Celsius) -> bool {
        self.min.deviates_from(recommended) || self.max.deviates_from(recommended)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thermograph {
    pub number: String,
    pub min: Celsius,
    pub max: Celsius,
    #[serde(deserialize_with = "worked_status", default)]
    pub worked: String,
    #[serde(default)]
    pub graph: Option<Photo>,
}

impl Thermograph {
    pub fn boundaries(&self) -> ThermometerBoundaries {
        ThermometerBoundaries { min: self.min, max: self.max }
    }

    /// Graph image bytes, if a non-empty graph is attached.
    pub fn graph_image(&self) -> Option<&[u8]> {
        self.graph.as_ref().filter(|g| !g.is_empty()).map(|g| g.file.as_slice())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureData {
    pub recommended: Celsius,
    pub pulp: ThermometerBoundaries,
    #[serde(default)]
    pub thermographs: Vec<Thermograph>,
    #[serde(deserialize_with = "violations_affect_status", default)]
    pub violations_affect: String,
}

impl TemperatureData {
    /// Pulp or any thermograph reading strays more than the threshold from the recommendation.
    pub fn has_violations(&self) -> bool {
        self.pulp.deviates_from(self.recommended)
            || self
                .thermographs
                .iter()
                .any(|th| th.boundaries().deviates_from(self.recommended))
    }
}

// ==============================================================================
// TRANSPORT UNITS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransportUnit {
    pub number: String,
    pub supplier: String,
    #[validate(length(min = 1, message = "every transport unit needs at least one cargo"))]
    #[serde(deserialize_with = "normalize_cargo")]
    pub cargo: Vec<String>,
    #[serde(default)]
    pub cargo_in_english: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub card: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub cultivar: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub units: Vec<String>,
    #[serde(default)]
    pub invoice: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub calibre: Vec<String>,
    pub temperature: TemperatureData,
    #[serde(default)]
    pub pallets: u32,
    #[serde(default)]
    pub damaged_pallets: u32,
    #[serde(default)]
    pub boxes: u32,
    #[serde(default)]
    pub damaged_boxes: u32,
    #[serde(default)]
    pub cargo_damage: f64,
    #[serde(default)]
    pub empty_boxes: u32,
    #[serde(default)]
    pub not_full_boxes: u32,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Container {
    #[validate(nested)]
    #[serde(flatten)]
    pub unit: TransportUnit,
    #[serde(rename = "BL")]
    pub bl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Truck {
    #[validate(nested)]
    #[serde(flatten)]
    pub unit: TransportUnit,
    #[serde(rename = "CMR")]
    pub cmr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuppliersTransportUnit {
    #[validate(nested)]
    #[serde(flatten)]
    pub unit: TransportUnit,
    pub distribution_center_receiver: String,
}

macro_rules! transport_unit_variant {
    ($($variant:ty),*) => {$(
        impl AsRef<TransportUnit> for $variant {
            fn as_ref(&self) -> &TransportUnit {
                &self.unit
            }
        }

        impl AsMut<TransportUnit> for $variant {
            fn as_mut(&mut self) -> &mut TransportUnit {
                &mut self.unit
            }
        }
    )*};
}

transport_unit_variant!(Container, Truck, SuppliersTransportUnit);

// ==============================================================================
// REPORTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCommon {
    pub place_of_inspection: String,
    pub number: String,
    pub order: String,
    pub inspection_date: String,
    pub surveyor: String,
    #[serde(default = "today")]
    pub issue_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SelfImportReport {
    #[serde(flatten)]
    pub common: ReportCommon,
    pub vessel: String,
    #[validate(length(min = 1, message = "report needs at least one transport unit"), nested)]
    pub transport_units: Vec<Container>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SelfImportOnAutoReport {
    #[serde(flatten)]
    pub common: ReportCommon,
    #[validate(length(min = 1, message = "report needs at least one transport unit"), nested)]
    pub transport_units: Vec<Truck>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PickupFromSupplierReport {
    #[serde(flatten)]
    pub common: ReportCommon,
    #[validate(length(min = 1, message = "report needs at least one transport unit"), nested)]
    pub transport_units: Vec<SuppliersTransportUnit>,
}

/// Behaviour shared by every report variant.
pub trait InspectionReport: Serialize {
    type Unit: Serialize + AsRef<TransportUnit> + AsMut<TransportUnit>;

    /// Folder under the templates root holding this variant's templates.
    const TEMPLATE_FOLDER: &'static str;

    fn common(&self) -> &ReportCommon;
    fn transport_units(&self) -> &[Self::Unit];
    fn transport_units_mut(&mut self) -> &mut [Self::Unit];
    /// Adds the variant specific header fields.
    fn extend_header(&self, header: &mut Map<String, Value>);

    fn units(&self) -> Vec<&TransportUnit> {
        self.transport_units().iter().map(AsRef::as_ref).collect()
    }

    fn all_cargos(&self) -> Vec<String> {
        distinct(self.units().into_iter().flat_map(|u| u.cargo.iter().cloned()))
    }

    fn all_cargos_in_english(&self) -> Vec<String> {
        distinct(
            self.units()
                .into_iter()
                .flat_map(|u| u.cargo_in_english.iter().cloned())
                .filter(|c| !c.is_empty()),
        )
    }

    fn translate_cargos(&mut self, translations: &TranslationSettings) {
        for unit in self.transport_units_mut() {
            let unit = unit.as_mut();
            unit.cargo_in_english = unit.cargo.iter().map(|c| translations.translate(c)).collect();
        }
    }

    /// Flattened report-wide fields used by the header table.
    fn header(&self) -> Value {
        let common = self.common();
        let units = self.units();
        let cargo = distinct(units.iter().flat_map(|u| {
            u.cargo
                .iter()
                .enumerate()
                .map(move |(i, c)| format!("{}/{}", capitalize(c), u.cargo_in_english.get(i).cloned().unwrap_or_default()))
        }));

        let mut header = Map::new();
        header.insert("report_number".into(), common.number.clone().into());
        header.insert("place_of_inspection".into(), common.place_of_inspection.clone().into());
        header.insert("inspection_date".into(), common.inspection_date.clone().into());
        header.insert("shipper".into(), distinct(units.iter().map(|u| u.supplier.clone())).into());
        header.insert("cargo".into(), cargo.into());
        header.insert(
            "transport_units".into(),
            units.iter().map(|u| u.number.clone()).collect::<Vec<_>>().into(),
        );
        header.insert("invoice".into(), distinct(units.iter().map(|u| u.invoice.clone())).into());
        header.insert("order".into(), common.order.clone().into());
        self.extend_header(&mut header);
        Value::Object(header)
    }

    /// Transport units that break the temperature regime.
    fn units_with_violations(&self) -> Vec<&TransportUnit> {
        self.units().into_iter().filter(|u| u.temperature.has_violations()).collect()
    }

    fn units_data(&self) -> AppResult<Vec<Value>> {
        self.transport_units().iter().map(to_data).collect()
    }

    /// Deterministic draft filename: number, order, suppliers, cargos and unit numbers.
    fn draft_name(&self, extension: &str) -> String {
        let units = self.units();
        let suppliers = distinct(units.iter().map(|u| u.supplier.clone()));
        let numbers: Vec<String> = units.iter().map(|u| u.number.clone()).collect();
        let name = format!(
            "{}_{}_{}_{}_{}.{}",
            self.common().number,
            self.common().order,
            suppliers.join("_"),
            self.all_cargos().join("_"),
            numbers.join("_"),
            extension
        );
        name.replace('/', "")
    }
}

impl InspectionReport for SelfImportReport {
    type Unit = Container;
    const TEMPLATE_FOLDER: &'static str = "SelfImportReport";

    fn common(&self) -> &ReportCommon {
        &self.common
    }

    fn transport_units(&self) -> &[Container] {
        &self.transport_units
    }

    fn transport_units_mut(&mut self) -> &mut [Container] {
        &mut self.transport_units
    }

    fn extend_header(&self, header: &mut Map<String, Value>) {
        header.insert("vessel".into(), self.vessel.clone().into());
        header.insert(
            "BL".into(),
            self.transport_units.iter().map(|u| u.bl.clone()).collect::<Vec<_>>().into(),
        );
    }
}

impl InspectionReport for SelfImportOnAutoReport {
    type Unit = Truck;
    const TEMPLATE_FOLDER: &'static str = "SelfImportOnAutoReport";

    fn common(&self) -> &ReportCommon {
        &self.common
    }

    fn transport_units(&self) -> &[Truck] {
        &self.transport_units
    }

    fn transport_units_mut(&mut self) -> &mut [Truck] {
        &mut self.transport_units
    }

    fn extend_header(&self, header: &mut Map<String, Value>) {
        header.insert(
            "CMR".into(),
            self.transport_units.iter().map(|u| u.cmr.clone()).collect::<Vec<_>>().into(),
        );
    }
}

impl InspectionReport for PickupFromSupplierReport {
    type Unit = SuppliersTransportUnit;
    const TEMPLATE_FOLDER: &'static str = "PickupFromSupplierReport";

    fn common(&self) -> &ReportCommon {
        &self.common
    }

    fn transport_units(&self) -> &[SuppliersTransportUnit] {
        &self.transport_units
    }

    fn transport_units_mut(&mut self) -> &mut [SuppliersTransportUnit] {
        &mut self.transport_units
    }

    fn extend_header(&self, header: &mut Map<String, Value>) {
        header.insert(
            "discharge_date".into(),
            self.transport_units.iter().map(|u| u.unit.date.clone()).collect::<Vec<_>>().into(),
        );
        header.insert(
            "distribution_center_receiver".into(),
            self.transport_units
                .iter()
                .map(|u| u.distribution_center_receiver.clone())
                .collect::<Vec<_>>()
                .into(),
        );
    }
}

/// Report payload as received at the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "report_type", rename_all = "snake_case")]
pub enum Report {
    SelfImport(SelfImportReport),
    SelfImportOnAuto(SelfImportOnAutoReport),
    PickupFromSupplier(PickupFromSupplierReport),
}

impl Report {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Report::SelfImport(r) => r.validate(),
            Report::SelfImportOnAuto(r) => r.validate(),
            Report::PickupFromSupplier(r) => r.validate(),
        }
    }

    pub fn template_folder(&self) -> &'static str {
        match self {
            Report::SelfImport(_) => SelfImportReport::TEMPLATE_FOLDER,
            Report::SelfImportOnAuto(_) => SelfImportOnAutoReport::TEMPLATE_FOLDER,
            Report::PickupFromSupplier(_) => PickupFromSupplierReport::TEMPLATE_FOLDER,
        }
    }

    pub fn units(&self) -> Vec<&TransportUnit> {
        match self {
            Report::SelfImport(r) => r.units(),
            Report::SelfImportOnAuto(r) => r.units(),
            Report::PickupFromSupplier(r) => r.units(),
        }
    }

    pub fn draft_name(&self, extension: &str) -> String {
        match self {
            Report::SelfImport(r) => r.draft_name(extension),
            Report::SelfImportOnAuto(r) => r.draft_name(extension),
            Report::PickupFromSupplier(r) => r.draft_name(extension),
        }
    }
}

// ==============================================================================
// API RESPONSES
// ==============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temperature(recommended: f64, pulp_min: f64, pulp_max: f64) -> TemperatureData {
        TemperatureData {
            recommended: Celsius(recommended),
            pulp: ThermometerBoundaries { min: Celsius(pulp_min), max: Celsius(pulp_max) },
            thermographs: Vec::new(),
            violations_affect: String::new(),
        }
    }

    fn self_import_payload() -> Value {
        json!({
            "report_type": "self_import",
            "place_of_inspection": "RC Alpha Centauri",
            "number": "12/34",
            "order": "LV-426",
            "inspection_date": "18.12.2020 - 19.12.2020",
            "surveyor": "Ellen Ripley",
            "vessel": "Rocinante",
            "transport_units": [{
                "number": "CRLU1395673",
                "supplier": "Weyland-Yutani Corp",
                "cargo": ["  Яблоко ", "Груша", " "],
                "card": "C-1",
                "cultivar": ["Gala"],
                "units": ["boxes"],
                "invoice": "XYZ2020000001283",
                "date": "2020-12-18",
                "calibre": ["70-75"],
                "BL": "AD2001308100",
                "pallets": 20,
                "boxes": 1600,
                "temperature": {
                    "recommended": 1,
                    "pulp": {"min": 0.5, "max": 1.5},
                    "violations_affect": "2",
                    "thermographs": [{
                        "number": "TH-1",
                        "min": -0.5,
                        "max": 2.5,
                        "worked": 1,
                        "graph": {"id": 1, "file": "data:image/png;base64,iVBORw0KGgo="}
                    }]
                },
                "photos": [{"id": 7, "file": "not a data url", "rotation": 90}]
            }]
        })
    }

    #[test]
    fn celsius_renders_sign_and_one_decimal() {
        assert_eq!(Celsius(5.0).to_string(), "+5.0");
        assert_eq!(Celsius(-1.25).to_string(), "-1.2");
        assert_eq!(Celsius(0.0).to_string(), "0.0");
        assert_eq!(serde_json::to_value(Celsius(2.5)).unwrap(), json!("+2.5"));
    }

    #[test]
    fn pulp_deviation_of_exactly_two_degrees_is_allowed() {
        assert!(!temperature(5.0, 3.0, 6.0).has_violations());
        assert!(temperature(5.0, 2.9, 6.0).has_violations());
        assert!(temperature(5.0, 5.0, 8.0).has_violations());
    }

    #[test]
    fn thermograph_deviation_is_a_violation() {
        let mut data = temperature(5.0, 5.0, 5.0);
        data.thermographs.push(Thermograph {
            number: "TH-1".into(),
            min: Celsius(4.0),
            max: Celsius(7.5),
            worked: String::new(),
            graph: None,
        });
        assert!(data.has_violations());
    }

    #[test]
    fn payload_is_normalized_on_deserialization() {
        let report: Report = serde_json::from_value(self_import_payload()).unwrap();
        let Report::SelfImport(report) = report else {
            panic!("expected a self import report");
        };
        let unit = &report.transport_units[0];
        assert_eq!(unit.unit.cargo, vec!["яблоко", "груша"]);
        assert_eq!(unit.unit.card, vec!["C-1"]);
        assert_eq!(unit.bl, "AD2001308100");
        assert_eq!(unit.unit.temperature.thermographs[0].worked, "Да/Yes");
        assert_eq!(unit.unit.temperature.violations_affect, "Да/Нет\nYes/No");
        assert!(unit.unit.temperature.thermographs[0].graph_image().is_some());
        assert!(unit.unit.photos[0].is_empty());
        assert_eq!(report.common.issue_date.len(), "01.01.2024".len());
        assert!(report.validate().is_ok());
    }

    #[test]
    fn report_without_units_fails_validation() {
        let mut payload = self_import_payload();
        payload["transport_units"] = json!([]);
        let report: Report = serde_json::from_value(payload).unwrap();
        assert!(report.validate().is_err());
    }

    #[test]
    fn unit_without_cargo_fails_validation() {
        let mut payload = self_import_payload();
        payload["transport_units"][0]["cargo"] = json!([" ", ""]);
        let report: Report = serde_json::from_value(payload).unwrap();
        assert!(report.validate().is_err());
    }

    #[test]
    fn header_projection_pairs_cargo_with_translation() {
        let Report::SelfImport(mut report) = serde_json::from_value(self_import_payload()).unwrap() else {
            panic!("expected a self import report");
        };
        let translations = TranslationSettings {
            fruits: [("яблоко".to_string(), "Apple".to_string())].into(),
            ..Default::default()
        };
        report.translate_cargos(&translations);

        let header = report.header();
        assert_eq!(header["report_number"], "12/34");
        assert_eq!(header["cargo"], json!(["Яблоко/Apple", "Груша/"]));
        assert_eq!(header["shipper"], json!(["Weyland-Yutani Corp"]));
        assert_eq!(header["BL"], json!(["AD2001308100"]));
        assert_eq!(header["vessel"], "Rocinante");
        assert_eq!(report.all_cargos_in_english(), vec!["Apple"]);
    }

    #[test]
    fn draft_name_strips_slashes() {
        let report: Report = serde_json::from_value(self_import_payload()).unwrap();
        assert_eq!(
            report.draft_name("json"),
            "1234_LV-426_Weyland-Yutani Corp_яблоко_груша_CRLU1395673.json"
        );
    }

    #[test]
    fn unit_data_is_flattened_with_variant_fields() {
        let Report::SelfImport(report) = serde_json::from_value(self_import_payload()).unwrap() else {
            panic!("expected a self import report");
        };
        let data = report.units_data().unwrap();
        assert_eq!(data[0]["BL"], "AD2001308100");
        assert_eq!(data[0]["number"], "CRLU1395673");
        assert_eq!(data[0]["temperature"]["pulp"]["min"], "+0.5");
    }

    #[test]
    fn distinct_keeps_first_appearance_order() {
        let values = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(distinct(values), vec!["b", "a", "c"]);
    }
}
