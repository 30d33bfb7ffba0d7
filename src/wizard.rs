use crate::error::EngineError;
use std::collections::BTreeMap;

pub type StepData = BTreeMap<String, String>;
type Validator = fn(&StepData) -> Result<(), EngineError>;

const SECRET_TYPES: [&str; 3] = [
    "Opaque",
    "kubernetes.io/basic-auth",
    "kubernetes.io/ssh-auth",
];

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum WizardKind {
    CreateSecret,
    SetEnvVar {
        namespace: String,
        deployment: String,
    },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FieldKind {
    Text { masked: bool },
    Choice(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone)]
pub struct StepSpec {
    pub title: &'static str,
    pub fields: Vec<FieldSpec>,
    validate: Validator,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum WizardTransition {
    Advanced(usize),
    Retreated(usize),
    Rejected(EngineError),
    Submit(StepData),
    Unchanged,
}

/// Step-gated input flow that collects data for a single commit.
#[derive(Debug, Clone)]
pub struct Wizard {
    kind: WizardKind,
    title: String,
    steps: Vec<StepSpec>,
    step: usize,
    data: StepData,
    validated: Vec<bool>,
    focus: usize,
    error: Option<String>,
    submitting: bool,
}

impl Wizard {
    pub fn create_secret(namespace: Option<&str>) -> Self {
        let mut wizard = Self::new(
            WizardKind::CreateSecret,
            "Create secret".to_string(),
            vec![
                StepSpec {
                    title: "Secret",
                    fields: vec![
                        text_field("name", "Name"),
                        text_field("namespace", "Namespace"),
                        FieldSpec {
                            name: "type",
                            label: "Type",
                            kind: FieldKind::Choice(
                                SECRET_TYPES.iter().map(|value| value.to_string()).collect(),
                            ),
                        },
                    ],
                    validate: validate_secret_identity,
                },
                StepSpec {
                    title: "Data",
                    fields: vec![
                        text_field("key", "Key"),
                        FieldSpec {
                            name: "value",
                            label: "Value",
                            kind: FieldKind::Text { masked: true },
                        },
                    ],
                    validate: validate_secret_entry,
                },
            ],
        );
        if let Some(namespace) = namespace {
            wizard.data.insert("namespace".to_string(), namespace.to_string());
        }
        wizard
    }

    pub fn set_env_var(namespace: &str, deployment: &str) -> Self {
        Self::new(
            WizardKind::SetEnvVar {
                namespace: namespace.to_string(),
                deployment: deployment.to_string(),
            },
            format!("Set env var on {namespace}/{deployment}"),
            vec![
                StepSpec {
                    title: "Container",
                    fields: vec![text_field("container", "Container")],
                    validate: validate_container,
                },
                StepSpec {
                    title: "Variable",
                    fields: vec![text_field("name", "Name"), text_field("value", "Value")],
                    validate: validate_env_var,
                },
            ],
        )
    }

    fn new(kind: WizardKind, title: String, steps: Vec<StepSpec>) -> Self {
        let mut data = StepData::new();
        for field in steps.iter().flat_map(|step| step.fields.iter()) {
            let initial = match &field.kind {
                FieldKind::Choice(options) => options.first().cloned().unwrap_or_default(),
                FieldKind::Text { .. } => String::new(),
            };
            data.insert(field.name.to_string(), initial);
        }

        let validated = vec![false; steps.len()];
        Self {
            kind,
            title,
            steps,
            step: 0,
            data,
            validated,
            focus: 0,
            error: None,
            submitting: false,
        }
    }

    pub fn kind(&self) -> &WizardKind {
        &self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> &StepSpec {
        &self.steps[self.step]
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_validated(&self, step: usize) -> bool {
        self.validated.get(step).copied().unwrap_or(false)
    }

    pub fn value(&self, field: &str) -> &str {
        self.data.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn input_char(&mut self, c: char) {
        if let Some(field) = self.focused_text_field() {
            self.data.entry(field.to_string()).or_default().push(c);
            self.error = None;
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.focused_text_field() {
            if let Some(value) = self.data.get_mut(field) {
                value.pop();
            }
            self.error = None;
        }
    }

    pub fn focus_next(&mut self) {
        let count = self.current_step().fields.len();
        self.focus = (self.focus + 1) % count.max(1);
    }

    pub fn focus_prev(&mut self) {
        let count = self.current_step().fields.len().max(1);
        self.focus = (self.focus + count - 1) % count;
    }

    pub fn cycle_choice(&mut self, delta: isize) {
        let Some(field) = self.current_step().fields.get(self.focus) else {
            return;
        };
        let FieldKind::Choice(options) = &field.kind else {
            return;
        };
        if options.is_empty() {
            return;
        }

        let current = self.value(field.name);
        let position = options
            .iter()
            .position(|option| option == current)
            .unwrap_or(0) as isize;
        let len = options.len() as isize;
        let next = (position + delta).rem_euclid(len) as usize;
        let (name, value) = (field.name.to_string(), options[next].clone());
        self.data.insert(name, value);
    }

    /// Validates the current step and either advances or asks for submission.
    pub fn next(&mut self) -> WizardTransition {
        if self.submitting {
            return WizardTransition::Unchanged;
        }

        if let Err(error) = (self.current_step().validate)(&self.data) {
            self.validated[self.step] = false;
            self.error = Some(error.to_string());
            return WizardTransition::Rejected(error);
        }

        self.validated[self.step] = true;
        self.error = None;
        if self.step + 1 < self.steps.len() {
            self.step += 1;
            self.focus = 0;
            return WizardTransition::Advanced(self.step);
        }

        self.submitting = true;
        WizardTransition::Submit(self.data.clone())
    }

    pub fn back(&mut self) -> WizardTransition {
        if self.submitting || self.step == 0 {
            return WizardTransition::Unchanged;
        }

        self.step -= 1;
        self.focus = 0;
        self.error = None;
        WizardTransition::Retreated(self.step)
    }

    /// Keeps the wizard on its final step with the failure shown.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.submitting = false;
        self.error = Some(error.into());
    }

    fn focused_text_field(&self) -> Option<&'static str> {
        if self.submitting {
            return None;
        }
        self.current_step()
            .fields
            .get(self.focus)
            .filter(|field| matches!(field.kind, FieldKind::Text { .. }))
            .map(|field| field.name)
    }
}

fn text_field(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Text { masked: false },
    }
}

fn field<'a>(data: &'a StepData, name: &str) -> &'a str {
    data.get(name).map(|value| value.trim()).unwrap_or("")
}

fn validate_secret_identity(data: &StepData) -> Result<(), EngineError> {
    validate_dns_subdomain("name", field(data, "name"))?;
    validate_dns_label("namespace", field(data, "namespace"))
}

fn validate_secret_entry(data: &StepData) -> Result<(), EngineError> {
    let key = field(data, "key");
    if key.is_empty() {
        return Err(EngineError::validation("key", "must not be empty"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(EngineError::validation(
            "key",
            "may only contain letters, digits, '-', '_' and '.'",
        ));
    }
    if data.get("value").is_none_or(|value| value.is_empty()) {
        return Err(EngineError::validation("value", "must not be empty"));
    }
    Ok(())
}

fn validate_container(data: &StepData) -> Result<(), EngineError> {
    validate_dns_label("container", field(data, "container"))
}

fn validate_env_var(data: &StepData) -> Result<(), EngineError> {
    let name = field(data, "name");
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(EngineError::validation(
            "name",
            "must start with a letter or '_' and contain only letters, digits and '_'",
        ));
    }
    Ok(())
}

fn validate_dns_label(field: &str, value: &str) -> Result<(), EngineError> {
    if value.is_empty() || value.len() > 63 {
        return Err(EngineError::validation(field, "must be 1-63 characters"));
    }
    if !is_dns_segment(value) {
        return Err(EngineError::validation(
            field,
            "must be lowercase alphanumerics or '-', starting and ending with an alphanumeric",
        ));
    }
    Ok(())
}

fn validate_dns_subdomain(field: &str, value: &str) -> Result<(), EngineError> {
    if value.is_empty() || value.len() > 253 {
        return Err(EngineError::validation(field, "must be 1-253 characters"));
    }
    if !value.split('.').all(is_dns_segment) {
        return Err(EngineError::validation(
            field,
            "must be lowercase alphanumerics, '-' or '.', starting and ending with an alphanumeric",
        ));
    }
    Ok(())
}

fn is_dns_segment(segment: &str) -> bool {
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    edge_ok(segment.chars().next())
        && edge_ok(segment.chars().last())
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::{FieldKind, Wizard, WizardKind, WizardTransition};
    use crate::error::EngineError;

    fn type_text(wizard: &mut Wizard, text: &str) {
        for c in text.chars() {
            wizard.input_char(c);
        }
    }

    #[test]
    fn secret_wizard_prefills_namespace_and_choice() {
        let wizard = Wizard::create_secret(Some("payments"));
        assert_eq!(wizard.kind(), &WizardKind::CreateSecret);
        assert_eq!(wizard.value("namespace"), "payments");
        assert_eq!(wizard.value("type"), "Opaque");
        assert_eq!(wizard.step_count(), 2);
    }

    #[test]
    fn next_is_gated_by_validation() {
        let mut wizard = Wizard::create_secret(Some("default"));
        let transition = wizard.next();

        assert!(matches!(
            transition,
            WizardTransition::Rejected(EngineError::Validation { ref field, .. }) if field == "name"
        ));
        assert_eq!(wizard.step(), 0);
        assert!(wizard.error().is_some());
        assert!(!wizard.is_validated(0));

        type_text(&mut wizard, "Bad_Name");
        assert!(wizard.error().is_none());
        assert!(matches!(wizard.next(), WizardTransition::Rejected(_)));
    }

    #[test]
    fn data_survives_back_navigation() {
        let mut wizard = Wizard::create_secret(Some("default"));
        type_text(&mut wizard, "db-creds");
        wizard.focus_next();
        wizard.focus_next();
        wizard.cycle_choice(1);
        assert_eq!(wizard.next(), WizardTransition::Advanced(1));

        type_text(&mut wizard, "password");
        assert_eq!(wizard.back(), WizardTransition::Retreated(0));

        assert_eq!(wizard.value("name"), "db-creds");
        assert_eq!(wizard.value("type"), "kubernetes.io/basic-auth");
        assert_eq!(wizard.value("key"), "password");
        assert!(wizard.is_validated(0));
    }

    #[test]
    fn back_on_first_step_is_unchanged() {
        let mut wizard = Wizard::create_secret(None);
        assert_eq!(wizard.back(), WizardTransition::Unchanged);
    }

    #[test]
    fn final_step_submits_accumulated_data() {
        let mut wizard = Wizard::create_secret(Some("default"));
        type_text(&mut wizard, "db-creds");
        wizard.next();
        type_text(&mut wizard, "password");
        wizard.focus_next();
        type_text(&mut wizard, "s3cr3t");

        let WizardTransition::Submit(data) = wizard.next() else {
            panic!("expected submission");
        };
        assert_eq!(data.get("name").map(String::as_str), Some("db-creds"));
        assert_eq!(data.get("value").map(String::as_str), Some("s3cr3t"));
        assert!(wizard.is_submitting());
        assert_eq!(wizard.next(), WizardTransition::Unchanged);
    }

    #[test]
    fn failure_keeps_final_step_editable() {
        let mut wizard = Wizard::set_env_var("default", "api");
        type_text(&mut wizard, "app");
        wizard.next();
        type_text(&mut wizard, "LOG_LEVEL");
        wizard.focus_next();
        type_text(&mut wizard, "debug");
        assert!(matches!(wizard.next(), WizardTransition::Submit(_)));

        wizard.fail("deployment not found");
        assert_eq!(wizard.step(), 1);
        assert_eq!(wizard.error(), Some("deployment not found"));
        assert!(!wizard.is_submitting());

        wizard.backspace();
        assert_eq!(wizard.value("value"), "debu");
        assert!(matches!(wizard.next(), WizardTransition::Submit(_)));
    }

    #[test]
    fn env_name_must_be_identifier() {
        let mut wizard = Wizard::set_env_var("default", "api");
        type_text(&mut wizard, "app");
        wizard.next();
        type_text(&mut wizard, "9LIVES");
        assert!(matches!(wizard.next(), WizardTransition::Rejected(_)));
    }

    #[test]
    fn typing_into_choice_field_is_ignored() {
        let mut wizard = Wizard::create_secret(None);
        wizard.focus_prev();
        assert!(matches!(
            wizard.current_step().fields[wizard.focus()].kind,
            FieldKind::Choice(_)
        ));
        wizard.input_char('x');
        assert_eq!(wizard.value("type"), "Opaque");
        wizard.cycle_choice(-1);
        assert_eq!(wizard.value("type"), "kubernetes.io/ssh-auth");
    }

    #[test]
    fn subdomain_names_may_contain_dots() {
        let mut wizard = Wizard::create_secret(Some("default"));
        type_text(&mut wizard, "tls.example.com");
        assert_eq!(wizard.next(), WizardTransition::Advanced(1));
    }
}
