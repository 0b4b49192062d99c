//! Risk factor input form.

use std::collections::BTreeMap;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use zeroize::Zeroize;

use crate::domain::{
    describe, grouped_keys, FieldDescriptor, FieldKind, FieldValue, FormRecord, InvalidReason,
    ValidationErrors,
};
use crate::tui::styles::MedicalTheme;

/// One editable field.
#[derive(Debug, Clone)]
pub struct FormField {
    pub descriptor: &'static FieldDescriptor,
    /// Typed text for continuous fields.
    pub input: String,
    /// Selected option index for categorical fields.
    pub choice: Option<usize>,
}

impl FormField {
    fn new(descriptor: &'static FieldDescriptor) -> Self {
        Self {
            descriptor,
            input: String::new(),
            choice: None,
        }
    }

    /// Current value as a form record slot.
    #[must_use]
    pub fn value(&self) -> FieldValue {
        match self.descriptor.kind {
            FieldKind::Continuous { .. } if self.input.is_empty() => FieldValue::Unset,
            FieldKind::Continuous { .. } => FieldValue::Text(self.input.clone()),
            FieldKind::Categorical { options } => self
                .choice
                .and_then(|i| options.get(i))
                .map_or(FieldValue::Unset, |o| FieldValue::Text((*o).to_string())),
        }
    }

    fn display_value(&self) -> Option<String> {
        match self.descriptor.kind {
            FieldKind::Continuous { .. } if self.input.is_empty() => None,
            FieldKind::Continuous { .. } => Some(self.input.clone()),
            FieldKind::Categorical { options } => self
                .choice
                .and_then(|i| options.get(i))
                .map(|o| format!("◂ {o} ▸")),
        }
    }

    fn hint(&self) -> String {
        match self.descriptor.kind {
            FieldKind::Continuous { unit } => format!("enter value ({unit})"),
            FieldKind::Categorical { options } => format!("←→ {}", options.join(" / ")),
        }
    }
}

/// Form state, one slot per schema field in display order.
pub struct FormState {
    pub fields: Vec<FormField>,
    pub selected_field: usize,
    pub errors: BTreeMap<&'static str, InvalidReason>,
    pub message: Option<String>,
}

impl Default for FormState {
    fn default() -> Self {
        // Grouping keys are schema keys by construction.
        let fields = grouped_keys()
            .iter()
            .flat_map(|(_, keys)| keys.iter())
            .filter_map(|key| describe(key).ok())
            .map(FormField::new)
            .collect();

        Self {
            fields,
            selected_field: 0,
            errors: BTreeMap::new(),
            message: None,
        }
    }
}

impl FormState {
    /// Move to the next field
    pub fn next_field(&mut self) {
        self.selected_field = (self.selected_field + 1) % self.fields.len();
    }

    /// Move to the previous field
    pub fn prev_field(&mut self) {
        if self.selected_field == 0 {
            self.selected_field = self.fields.len() - 1;
        } else {
            self.selected_field -= 1;
        }
    }

    fn current(&mut self) -> &mut FormField {
        &mut self.fields[self.selected_field]
    }

    fn touch(&mut self) {
        let key = self.fields[self.selected_field].descriptor.key;
        self.errors.remove(key);
        self.message = None;
    }

    /// Add a character to the current numeric field
    pub fn input_char(&mut self, c: char) {
        let field = self.current();
        if field.descriptor.is_continuous() && (c.is_ascii_digit() || c == '.' || c == '-') {
            field.input.push(c);
            self.touch();
        }
    }

    /// Delete the last character
    pub fn delete_char(&mut self) {
        self.current().input.pop();
        self.touch();
    }

    /// Clear the current field
    pub fn clear_field(&mut self) {
        let field = self.current();
        field.input.zeroize();
        field.choice = None;
        self.touch();
    }

    /// Select the next option of the current categorical field
    pub fn next_option(&mut self) {
        let field = self.current();
        let count = field.descriptor.options().len();
        if count == 0 {
            return;
        }
        field.choice = Some(field.choice.map_or(0, |i| (i + 1) % count));
        self.touch();
    }

    /// Select the previous option of the current categorical field
    pub fn prev_option(&mut self) {
        let field = self.current();
        let count = field.descriptor.options().len();
        if count == 0 {
            return;
        }
        field.choice = Some(match field.choice {
            None | Some(0) => count - 1,
            Some(i) => i - 1,
        });
        self.touch();
    }

    /// Snapshot the form as a record.
    #[must_use]
    pub fn to_record(&self) -> FormRecord {
        let mut record = FormRecord::new();
        for field in &self.fields {
            // Descriptor keys always belong to the schema.
            let _ = record.set(field.descriptor.key, field.value());
        }
        record
    }

    /// Show validation failures next to their fields.
    pub fn apply_errors(&mut self, errors: &ValidationErrors) {
        self.errors = errors.0.iter().map(|e| (e.key(), e.reason())).collect();
        self.message = Some(format!("{} field(s) need attention", errors.len()));
    }

    /// Wipe all field buffers from memory and clear values.
    ///
    /// Called once a result is displayed so entered values do not persist in the UI state.
    pub fn clear_sensitive(&mut self) {
        for field in self.fields.iter_mut() {
            field.input.zeroize();
            field.choice = None;
        }
        self.errors.clear();
        self.message = None;
        self.selected_field = 0;
    }

    /// Load sample data for testing (8-year-old, congenital EOS, bilateral MCGR)
    pub fn load_sample_data(&mut self) {
        let sample: [(&str, &str); 13] = [
            ("age_at_insertion", "8"),
            ("height_pre", "118"),
            ("weight_pre", "21"),
            ("eos_type", "Congenital"),
            ("amb_status_preop", "Ambulatory"),
            ("major_cobb_angle_pre", "68"),
            ("minor_cobb_angle_pre", "34"),
            ("kyphosis_pre", "45"),
            ("construct_type_initial", "MCGR"),
            ("construct_side_initial", "Bilateral"),
            ("superior_attach_initial", "Spine"),
            ("num_superior_anchors_initial", "4"),
            ("inferior_attach_initial", "Spine"),
        ];
        for (key, value) in sample {
            if let Some(field) = self.fields.iter_mut().find(|f| f.descriptor.key == key) {
                match field.descriptor.kind {
                    FieldKind::Continuous { .. } => field.input = value.to_string(),
                    FieldKind::Categorical { options } => {
                        field.choice = options.iter().position(|o| *o == value);
                    }
                }
            }
        }
        self.errors.clear();
        self.message = None;
    }
}

/// Render the form: one bordered section per category.
pub fn render_form(f: &mut Frame, area: Rect, state: &FormState) {
    let groups = grouped_keys();
    let constraints: Vec<Constraint> = groups
        .iter()
        .map(|(_, keys)| Constraint::Length(keys.len() as u16 + 2))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut offset = 0;
    for (i, (category, keys)) in groups.iter().enumerate() {
        let end = (offset + keys.len()).min(state.fields.len());
        render_group(f, chunks[i], category, &state.fields[offset..end], offset, state);
        offset = end;
    }
}

fn render_group(
    f: &mut Frame,
    area: Rect,
    category: &str,
    fields: &[FormField],
    offset: usize,
    state: &FormState,
) {
    let block = Block::default()
        .title(Span::styled(format!(" {category} "), MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border());

    let lines: Vec<Line> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| field_line(field, offset + i == state.selected_field, state))
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line<'a>(field: &'a FormField, is_selected: bool, state: &FormState) -> Line<'a> {
    let label_style = if is_selected {
        MedicalTheme::focused()
    } else {
        MedicalTheme::text_secondary()
    };

    let mut spans = vec![
        Span::styled(if is_selected { "▌" } else { " " }, MedicalTheme::focused()),
        Span::styled(format!("{:<22}", field.descriptor.label), label_style),
    ];

    match field.display_value() {
        Some(value) => spans.push(Span::styled(value, MedicalTheme::text())),
        None => spans.push(Span::styled(field.hint(), MedicalTheme::text_muted())),
    }
    if let (Some(unit), false) = (field.descriptor.unit(), field.input.is_empty()) {
        spans.push(Span::styled(format!(" {unit}"), MedicalTheme::text_secondary()));
    }
    if let Some(reason) = state.errors.get(field.descriptor.key) {
        spans.push(Span::styled(format!("  ! {reason}"), MedicalTheme::danger()));
    }

    Line::from(spans)
}
