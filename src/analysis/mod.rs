//! Heuristic agronomy derived from satellite readings.
//!
//! Every function here is pure. The coefficients are placeholder business rules,
//! not a calibrated agronomic model.

use crate::domain::{
    Language, NutrientEstimates, WeatherAverages, WeatherSnapshot, WeatherSummary,
};
use crate::utils::{clamp_number, round_to};

pub const MAX_RECOMMENDATIONS: usize = 5;

const BASELINE_PH: f64 = 6.6;

/// Crop families that shift the soil pH estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropProfile {
    Rice,
    Citrus,
    Other,
}

impl CropProfile {
    /// Classify a free-text crop label (English or Arabic) once, up front
    pub fn classify(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return CropProfile::Other;
        };
        let normalized = label.trim().to_lowercase();
        if ["rice", "paddy", "أرز"].iter().any(|k| normalized.contains(k)) {
            CropProfile::Rice
        } else if ["citrus", "حمضيات"].iter().any(|k| normalized.contains(k)) {
            CropProfile::Citrus
        } else {
            CropProfile::Other
        }
    }

    fn ph_adjustment(self) -> f64 {
        match self {
            CropProfile::Rice => -0.3,
            CropProfile::Citrus => 0.1,
            CropProfile::Other => 0.0,
        }
    }
}

/// Satellite signals feeding the derivations
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readings {
    pub ndvi: Option<f64>,
    pub chlorophyll: Option<f64>,
    pub moisture_percent: Option<f64>,
}

/// Map a raw soil-moisture index to a percentage in `[5, 100]`.
/// Fractions are scaled by 100, values above 1 are taken as percentages already.
pub fn normalize_soil_moisture(raw: f64) -> f64 {
    if raw > 1.0 {
        clamp_number(raw, 5.0, 100.0)
    } else {
        clamp_number((raw * 100.0).round(), 5.0, 100.0)
    }
}

pub fn nitrogen_from_ndvi(ndvi: Option<f64>) -> f64 {
    match ndvi {
        None => 22.0,
        Some(v) if v > 0.7 => 45.0,
        Some(v) if v > 0.55 => 33.0,
        Some(v) if v > 0.35 => 22.0,
        Some(_) => 15.0,
    }
}

pub fn derive_nutrient_estimates(readings: Readings, crop: CropProfile) -> NutrientEstimates {
    let ndvi = readings
        .ndvi
        .map(|v| clamp_number(v, 0.2, 0.9))
        .unwrap_or(0.45);
    let chlorophyll = readings
        .chlorophyll
        .map(|v| clamp_number(v, 0.3, 0.9))
        .unwrap_or(ndvi);
    let moisture = match readings.moisture_percent {
        Some(m) => clamp_number(m, 15.0, 85.0),
        None if ndvi > 0.5 => 55.0,
        None => 40.0,
    };

    let mut ph = BASELINE_PH;
    if moisture > 70.0 {
        ph -= 0.2;
    }
    if moisture < 35.0 {
        ph += 0.2;
    }
    ph += crop.ph_adjustment();

    let nitrogen = nitrogen_from_ndvi(Some(ndvi)) + if chlorophyll > 0.55 { 4.0 } else { 0.0 };
    let phosphorus = clamp_number(18.0 + ndvi * 18.0 + chlorophyll * 10.0, 12.0, 55.0);
    let potassium = clamp_number(120.0 + (moisture - 45.0) * 1.2, 80.0, 280.0);
    let organic_matter = clamp_number(1.4 + ndvi * 2.0 + (moisture - 40.0) / 60.0, 0.9, 5.5);

    NutrientEstimates {
        ph: round_to(ph, 2),
        nitrogen: round_to(nitrogen, 1),
        phosphorus: round_to(phosphorus, 1),
        potassium: round_to(potassium, 1),
        organic_matter: round_to(organic_matter, 1),
        moisture_percent: round_to(moisture, 1),
    }
}

pub fn describe_moisture_state(value: f64, language: Language) -> &'static str {
    if value < 30.0 {
        language.pick("منخفضة", "low")
    } else if value < 55.0 {
        language.pick("متوازنة", "balanced")
    } else if value < 75.0 {
        language.pick("مرتفعة", "high")
    } else {
        language.pick("مشبعة", "saturated")
    }
}

/// Fixed-point text with halves rounded away from zero
fn fixed(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, round_to(value, decimals as i32))
}

pub fn build_satellite_summary(
    language: Language,
    readings: Readings,
    crop_label: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(4);

    parts.push(match readings.ndvi {
        Some(ndvi) => {
            let state = if ndvi > 0.65 {
                language.pick("غطاء قوي", "vigorous canopy")
            } else if ndvi > 0.45 {
                language.pick("نمو متوسط", "moderate growth")
            } else {
                language.pick("إجهاد واضح", "stress")
            };
            match language {
                Language::Ar => format!("مؤشر NDVI عند {} مما يدل على {}", fixed(ndvi, 2), state),
                Language::En => format!("NDVI at {} indicating {}", fixed(ndvi, 2), state),
            }
        }
        None => language
            .pick("لا توجد قراءة NDVI مؤكدة", "No recent NDVI reading")
            .to_string(),
    });

    if let Some(chl) = readings.chlorophyll {
        let state = if chl > 0.6 {
            language.pick("ممتاز", "excellent")
        } else if chl > 0.45 {
            language.pick("جيد", "steady")
        } else {
            language.pick("منخفض", "low")
        };
        parts.push(match language {
            Language::Ar => format!("مستوى الكلوروفيل {} ({})", fixed(chl, 2), state),
            Language::En => format!("Chlorophyll {} ({})", fixed(chl, 2), state),
        });
    }

    parts.push(match readings.moisture_percent {
        Some(m) => {
            let state = describe_moisture_state(m, language);
            match language {
                Language::Ar => format!("رطوبة التربة المقدرة {}% ({})", fixed(m, 0), state),
                Language::En => format!("Soil moisture around {}% ({})", fixed(m, 0), state),
            }
        }
        None => language
            .pick("لم يتم تقدير الرطوبة من القراءات", "Moisture estimate unavailable")
            .to_string(),
    });

    if let Some(crop) = crop_label.filter(|c| !c.is_empty()) {
        parts.push(match language {
            Language::Ar => format!("تمت القراءة لحقل {}", crop),
            Language::En => format!("Reading tailored for {}", crop),
        });
    }

    parts.join(language.pick("، ", ". "))
}

pub fn build_satellite_recommendations(
    language: Language,
    readings: Readings,
    weather: Option<&WeatherSummary>,
) -> Vec<String> {
    let mut recs: Vec<&str> = Vec::new();

    match readings.moisture_percent {
        Some(m) if m < 35.0 => recs.push(language.pick(
            "قم بري خفيف خلال 12 ساعة والتركيز على المناطق الأضعف في الخريطة",
            "Apply a light irrigation within 12 hours focusing on the stress pockets.",
        )),
        Some(m) if m > 75.0 => recs.push(language.pick(
            "أجّل الري الثقيل وراقب الصرف لتجنب الغرق",
            "Delay heavy irrigation and monitor drainage to avoid waterlogging.",
        )),
        _ => {}
    }

    if readings.chlorophyll.is_some_and(|c| c < 0.45) {
        recs.push(language.pick(
            "اعط دفعة تسميد ورقي غني بالنيتروجين/المغنيسيوم لتحسين الكلوروفيل",
            "Provide a foliar feed rich in nitrogen/magnesium to lift chlorophyll levels.",
        ));
    }

    if readings.ndvi.is_some_and(|n| n < 0.4) {
        recs.push(language.pick(
            "نفذ جولة كشف حقلية للبحث عن آفات أو أعفان بالجذور",
            "Scout the field for pest or root issues causing vegetation decline.",
        ));
    }

    let rain_expected = weather
        .and_then(|w| w.latest.precipitation)
        .is_some_and(|p| p > 2.0);
    if rain_expected {
        recs.push(language.pick(
            "هناك مطر قصير؛ خفّض الري المجدول وأعد القياس بعد الهطول",
            "Upcoming rain detected; reduce scheduled irrigation and re-measure after rainfall.",
        ));
    }

    if recs.len() < 3 {
        recs.push(language.pick(
            "استمر في مراقبة صور NDVI الأسبوعية لضبط برنامج التسميد",
            "Keep tracking weekly NDVI to adjust fertilization program.",
        ));
    }

    if recs.len() < 4 {
        recs.push(language.pick(
            "سجّل قراءات الحقل لتتم مقارنة بيانات القمر الصناعي مع الاختبارات الأرضية",
            "Log field measurements so satellite signals stay calibrated with lab samples.",
        ));
    }

    recs.into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(str::to_string)
        .collect()
}

pub fn build_monitoring_checklist(language: Language, readings: Readings) -> Vec<String> {
    let mut checklist = vec![language.pick(
        "راجع تسجيلات الري السابقة للتأكد من توزيع متوازن",
        "Review past irrigation runs to confirm even distribution.",
    )];

    if let Some(m) = readings.moisture_percent {
        checklist.push(if m < 40.0 {
            language.pick(
                "اختبر رطوبة التربة يدويًا في 3 نقاط للتأكد من انخفاضها",
                "Verify low moisture with handheld probe at three spots.",
            )
        } else {
            language.pick(
                "تأكد من عدم ارتفاع الرطوبة الزائد في المناطق المنخفضة",
                "Ensure no standing water in low areas.",
            )
        });
    }

    if readings.chlorophyll.is_some_and(|c| c < 0.5) {
        checklist.push(language.pick(
            "افحص لون الأوراق لتحديد نقص العناصر الصغرى",
            "Inspect leaf coloration to confirm micronutrient deficiency.",
        ));
    }

    if readings.ndvi.is_some() {
        checklist.push(language.pick(
            "قارن صورة NDVI الحالية بالصورة السابقة لرصد أي بقع متدهورة",
            "Compare current NDVI tile to previous week to locate deteriorating spots.",
        ));
    }

    checklist.into_iter().map(str::to_string).collect()
}

/// Additive confidence score, always within `[0.35, 0.95]`
pub fn calculate_confidence(readings: Readings, weather: Option<&WeatherSummary>) -> f64 {
    let mut score = 0.35;
    if let Some(ndvi) = readings.ndvi.filter(|n| !n.is_nan()) {
        score += ((ndvi - 0.25).max(0.0) * 0.5).min(0.25);
    }
    if readings.moisture_percent.is_some() {
        score += 0.2;
    }
    if readings.chlorophyll.is_some() {
        score += 0.15;
    }
    if weather.is_some() {
        score += 0.1;
    }
    round_to(score.clamp(0.35, 0.95), 2)
}

/// Latest snapshot plus averages; `None` when there is nothing to summarise
pub fn summarise_weather(snapshots: &[WeatherSnapshot]) -> Option<WeatherSummary> {
    let latest = snapshots.last()?.clone();

    let average = |values: Vec<f64>| -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(round_to(values.iter().sum::<f64>() / values.len() as f64, 1))
    };

    Some(WeatherSummary {
        latest,
        averages: WeatherAverages {
            humidity: average(snapshots.iter().filter_map(|s| s.humidity).collect()),
            temperature: average(snapshots.iter().filter_map(|s| s.temperature).collect()),
        },
    })
}
