//! TUI add-event dialog.
//!
//! Pressing `a` while editing is unlocked opens this overlay. Fields are
//! edited in place:
//!
//! - **Tab** / **Shift-Tab** (or ↓ / ↑) move between fields
//! - **←** / **→** pick a category and **Space** toggles it
//! - **Enter** submits, **Esc** cancels
//!
//! Validation happens in the session; a rejected submission keeps the dialog
//! open with the message shown inline.

use std::path::PathBuf;

use cas_timeline_core::Category;
use cas_timeline_core::authoring::{DraftInput, split_list};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Form fields in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Date,
    Summary,
    Details,
    Categories,
    Images,
    ImageFiles,
    Videos,
    Links,
    Keywords,
}

impl Field {
    const ORDER: [Self; 10] = [
        Self::Title,
        Self::Date,
        Self::Summary,
        Self::Details,
        Self::Categories,
        Self::Images,
        Self::ImageFiles,
        Self::Videos,
        Self::Links,
        Self::Keywords,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Date => "Date",
            Self::Summary => "Summary",
            Self::Details => "Details",
            Self::Categories => "Categories",
            Self::Images => "Image URLs",
            Self::ImageFiles => "Image files",
            Self::Videos => "Video URLs",
            Self::Links => "Links",
            Self::Keywords => "Keywords",
        }
    }

    const fn placeholder(self) -> &'static str {
        match self {
            Self::Date => "YYYY-MM-DD",
            Self::Images | Self::Videos | Self::Keywords => "comma separated",
            Self::ImageFiles => "paths, comma separated",
            Self::Links => "label | url; label | url",
            _ => "",
        }
    }

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        let len = Self::ORDER.len();
        Self::ORDER[(self.position() + len - 1) % len]
    }
}

/// What the owner does with a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSubmission {
    pub input: DraftInput,
    /// Files to upload before the event is created.
    pub image_files: Vec<PathBuf>,
}

/// The action the dialog wants the caller to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    Submit(AddSubmission),
    Cancel,
}

/// Overlay form for authoring one event.
#[derive(Debug, Default)]
pub struct AddDialog {
    title: String,
    date: String,
    summary: String,
    details: String,
    categories: Vec<Category>,
    images: String,
    image_files: String,
    videos: String,
    links: String,
    keywords: String,
    focus: Option<Field>,
    category_cursor: usize,
    error: Option<String>,
}

impl AddDialog {
    pub fn new() -> Self {
        Self {
            focus: Some(Field::Title),
            ..Self::default()
        }
    }

    /// Show a rejection inline and keep the dialog open.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    fn focus(&self) -> Field {
        self.focus.unwrap_or(Field::Title)
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Title => Some(&mut self.title),
            Field::Date => Some(&mut self.date),
            Field::Summary => Some(&mut self.summary),
            Field::Details => Some(&mut self.details),
            Field::Categories => None,
            Field::Images => Some(&mut self.images),
            Field::ImageFiles => Some(&mut self.image_files),
            Field::Videos => Some(&mut self.videos),
            Field::Links => Some(&mut self.links),
            Field::Keywords => Some(&mut self.keywords),
        }
    }

    fn text(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Date => &self.date,
            Field::Summary => &self.summary,
            Field::Details => &self.details,
            Field::Categories => "",
            Field::Images => &self.images,
            Field::ImageFiles => &self.image_files,
            Field::Videos => &self.videos,
            Field::Links => &self.links,
            Field::Keywords => &self.keywords,
        }
    }

    fn toggle_category(&mut self) {
        let category = Category::ALL[self.category_cursor % Category::ALL.len()];
        if let Some(pos) = self.categories.iter().position(|c| *c == category) {
            self.categories.remove(pos);
        } else {
            self.categories.push(category);
        }
    }

    fn submission(&self) -> AddSubmission {
        AddSubmission {
            input: DraftInput {
                title: self.title.clone(),
                date: self.date.clone(),
                summary: self.summary.clone(),
                details: self.details.clone(),
                categories: self.categories.clone(),
                images: self.images.clone(),
                videos: self.videos.clone(),
                // One line per link in the form model.
                links: self.links.split(';').collect::<Vec<_>>().join("\n"),
                keywords: self.keywords.clone(),
                uploaded_images: Vec::new(),
            },
            image_files: split_list(&self.image_files)
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Input handling
    // -----------------------------------------------------------------------

    /// Feed a key event to the dialog.
    ///
    /// Returns `Some(DialogAction)` when the dialog is done with the key's
    /// result, `None` while the user is still editing.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<DialogAction> {
        let field = self.focus();
        match key.code {
            KeyCode::Esc => return Some(DialogAction::Cancel),
            KeyCode::Enter => return Some(DialogAction::Submit(self.submission())),
            KeyCode::Tab | KeyCode::Down => self.focus = Some(field.next()),
            KeyCode::BackTab | KeyCode::Up => self.focus = Some(field.prev()),
            KeyCode::Left if field == Field::Categories => {
                let len = Category::ALL.len();
                self.category_cursor = (self.category_cursor + len - 1) % len;
            }
            KeyCode::Right if field == Field::Categories => {
                self.category_cursor = (self.category_cursor + 1) % Category::ALL.len();
            }
            KeyCode::Char(' ') if field == Field::Categories => self.toggle_category(),
            KeyCode::Backspace => {
                if let Some(text) = self.text_mut(field) {
                    text.pop();
                }
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(text) = self.text_mut(field) {
                    text.clear();
                }
            }
            KeyCode::Char(c) => {
                if let Some(text) = self.text_mut(field) {
                    text.push(c);
                }
            }
            _ => {}
        }
        self.error = None;
        None
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    fn field_line(&self, field: Field) -> Line<'static> {
        let focused = self.focus() == field;
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut spans = vec![Span::styled(format!("{:<12} ", field.label()), label_style)];

        if field == Field::Categories {
            for (idx, category) in Category::ALL.iter().enumerate() {
                let mark = if self.categories.contains(category) { "[x]" } else { "[ ]" };
                let mut style = Style::default();
                if focused && idx == self.category_cursor {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                spans.push(Span::styled(format!("{mark} {category}"), style));
                spans.push(Span::raw(" "));
            }
            return Line::from(spans);
        }

        let value = self.text(field);
        if value.is_empty() && !focused {
            spans.push(Span::styled(
                field.placeholder().to_string(),
                Style::default().fg(Color::DarkGray),
            ));
        } else if focused {
            spans.push(Span::raw(format!("{value}_")));
        } else {
            spans.push(Span::raw(value.to_string()));
        }
        Line::from(spans)
    }

    /// Render the dialog as a centered overlay on top of `area`.
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let rows = u16::try_from(Field::ORDER.len()).unwrap_or(u16::MAX);
        let dialog_w: u16 = 96.min(area.width.saturating_sub(4));
        let dialog_h: u16 = (rows + 5).min(area.height.saturating_sub(2));

        let dialog_area = Rect {
            x: area.x + area.width.saturating_sub(dialog_w) / 2,
            y: area.y + area.height.saturating_sub(dialog_h) / 2,
            width: dialog_w,
            height: dialog_h,
        };

        frame.render_widget(Clear, dialog_area);

        let mut lines: Vec<Line<'static>> = Field::ORDER
            .iter()
            .map(|field| self.field_line(*field))
            .collect();
        lines.push(Line::default());
        match &self.error {
            Some(message) => lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Red),
            ))),
            None => lines.push(Line::default()),
        }
        lines.push(Line::from(Span::styled(
            "Tab next  Shift-Tab prev  ←→ pick  Space toggle  Enter save  Esc cancel",
            Style::default().fg(Color::DarkGray),
        )));

        let form = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Add Event ")
                .title_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
                .style(Style::default().bg(Color::Black)),
        );
        frame.render_widget(form, dialog_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(dialog: &mut AddDialog, s: &str) {
        for c in s.chars() {
            assert!(dialog.handle_key(key(KeyCode::Char(c))).is_none());
        }
    }

    #[test]
    fn typing_fills_focused_field() {
        let mut d = AddDialog::new();
        type_str(&mut d, "Robotics");
        d.handle_key(key(KeyCode::Backspace));
        assert_eq!(d.title, "Robotic");
        d.handle_key(key(KeyCode::Tab));
        type_str(&mut d, "2024-03-01");
        assert_eq!(d.date, "2024-03-01");
    }

    #[test]
    fn focus_wraps_both_ways() {
        let mut d = AddDialog::new();
        d.handle_key(key(KeyCode::BackTab));
        assert_eq!(d.focus(), Field::Keywords);
        d.handle_key(key(KeyCode::Tab));
        assert_eq!(d.focus(), Field::Title);
    }

    #[test]
    fn space_toggles_category_under_cursor() {
        let mut d = AddDialog::new();
        d.focus = Some(Field::Categories);
        d.handle_key(key(KeyCode::Right));
        d.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(d.categories, [Category::ALL[1]]);
        d.handle_key(key(KeyCode::Char(' ')));
        assert!(d.categories.is_empty());
        d.handle_key(key(KeyCode::Left));
        d.handle_key(key(KeyCode::Left));
        d.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(d.categories, [Category::ALL[Category::ALL.len() - 1]]);
    }

    #[test]
    fn submit_builds_draft_and_file_list() {
        let mut d = AddDialog::new();
        d.links = "Report | https://x/r; Slides | https://x/s".into();
        d.image_files = "a.png, b.jpg".into();
        let Some(DialogAction::Submit(sub)) = d.handle_key(key(KeyCode::Enter)) else {
            panic!("expected submit");
        };
        assert_eq!(sub.input.links, "Report | https://x/r\n Slides | https://x/s");
        assert_eq!(sub.image_files, [PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
    }

    #[test]
    fn error_clears_on_next_edit() {
        let mut d = AddDialog::new();
        d.set_error("Fill title");
        assert!(d.error.is_some());
        d.handle_key(key(KeyCode::Char('x')));
        assert!(d.error.is_none());
    }

    #[test]
    fn esc_cancels() {
        let mut d = AddDialog::new();
        assert_eq!(d.handle_key(key(KeyCode::Esc)), Some(DialogAction::Cancel));
    }
}
