use serde::{Deserialize, Serialize};

/// Questionnaire answers submitted for a career suggestion.
///
/// The five core fields are asked of everyone; the rest depend on which branch
/// of the questionnaire (student, college, career, career change) was taken.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileAnswers {
    pub hobbies: String,
    pub skills: String,
    pub education: String,
    pub work_style: String,
    pub interests: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certifications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,

    // Student
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_subjects: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracurriculars: Option<String>,

    // College
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internships: Option<String>,

    // Working professional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<String>,

    // Career change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_for_change: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transferable_skills: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_work_environment: Option<String>,
}

impl ProfileAnswers {
    /// Labelled optional answers that were actually filled in, in questionnaire order.
    pub fn additional_context(&self) -> Vec<(&'static str, &str)> {
        let fields: [(&'static str, &Option<String>); 12] = [
            ("Age Group", &self.age_group),
            ("Portfolio / Project URL", &self.project_url),
            ("Favorite Subjects", &self.favorite_subjects),
            ("Extracurricular Activities", &self.extracurriculars),
            ("Major", &self.major),
            ("Minors", &self.minors),
            ("Internships", &self.internships),
            ("Work Experience", &self.work_experience),
            ("Achievements", &self.achievements),
            ("Reason for Career Change", &self.reason_for_change),
            ("Transferable Skills", &self.transferable_skills),
            ("Desired Work Environment", &self.desired_work_environment),
        ];

        fields
            .into_iter()
            .filter_map(|(label, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (label, v))
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct CareerDetail {
    pub title: String,
    /// Skills match percentage, 0..=100
    #[serde(rename = "match")]
    pub match_percentage: u32,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct CareerResult {
    pub iq: u32,
    pub professions: Vec<String>,
    pub details: Vec<CareerDetail>,
}
