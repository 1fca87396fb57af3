//! Projection of the sorted visible set into year groups and card
//! view-models, plus the transition planner that decides between an animated
//! swap and an immediate one.

use std::time::Duration;

use chrono::Datelike;

use crate::model::{DEFAULT_ACCENT, Rgb, TimelineItem, parse_date};

/// Cross-fade duration.
pub const TRANSITION: Duration = Duration::from_millis(220);

/// Media chips shown per card before the `+N` overflow.
pub const MAX_MEDIA_CHIPS: usize = 2;

/// Header label for items with no usable year.
pub const UNDATED_LABEL: &str = "Undated";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Link,
}

/// One media indicator on a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChip {
    pub kind: MediaKind,
    pub label: String,
    pub url: String,
}

/// Card view-model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub date_label: String,
    pub sustainability: bool,
    pub summary: String,
    pub details: String,
    pub categories: Vec<String>,
    pub accent: Rgb,
    pub media: Vec<MediaChip>,
    /// Count behind the `+N` chip; zero when everything fits.
    pub media_overflow: usize,
    pub deletable: bool,
}

/// Cards sharing a year, in first-encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearGroup {
    pub year: Option<i32>,
    pub label: String,
    pub cards: Vec<Card>,
}

/// Rendered timeline. No groups means the empty-state placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedTimeline {
    pub groups: Vec<YearGroup>,
}

impl RenderedTimeline {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn card_count(&self) -> usize {
        self.groups.iter().map(|g| g.cards.len()).sum()
    }

    /// Header labels in display order.
    pub fn year_labels(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.label.as_str())
    }

    /// Cards in display order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.groups.iter().flat_map(|g| g.cards.iter())
    }
}

/// Render options that are not part of the view state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Cards expose a delete affordance.
    pub deletable: bool,
}

/// Group `items` by year, keeping their order.
#[must_use]
pub fn render(items: &[TimelineItem], options: RenderOptions) -> RenderedTimeline {
    let mut groups: Vec<YearGroup> = Vec::new();
    for item in items {
        let year = item.year();
        let card = build_card(item, options);
        match groups.iter_mut().find(|g| g.year == year) {
            Some(group) => group.cards.push(card),
            None => groups.push(YearGroup {
                year,
                label: year.map_or_else(|| UNDATED_LABEL.to_string(), |y| y.to_string()),
                cards: vec![card],
            }),
        }
    }
    RenderedTimeline { groups }
}

fn build_card(item: &TimelineItem, options: RenderOptions) -> Card {
    let (media, media_overflow) = media_indicators(item);
    Card {
        id: item.id.clone(),
        title: item.title.clone(),
        date_label: format_date(&item.date),
        sustainability: item.is_sustainability(),
        summary: item.summary.clone(),
        details: item.details.clone(),
        categories: item.categories.clone(),
        accent: item
            .primary_category()
            .map_or(DEFAULT_ACCENT, |c| c.accent()),
        media,
        media_overflow,
        deletable: options.deletable,
    }
}

/// Up to [`MAX_MEDIA_CHIPS`] indicators (images, then videos, then links)
/// and the count left over.
///
/// Only the visible chips are materialized; the rest are counted.
#[must_use]
pub fn media_indicators(item: &TimelineItem) -> (Vec<MediaChip>, usize) {
    let several_images = item.images.len() > 1;
    let images = item.images.iter().enumerate().map(|(i, url)| MediaChip {
        kind: MediaKind::Image,
        label: if several_images {
            format!("Image {}", i + 1)
        } else {
            "Image".to_string()
        },
        url: url.clone(),
    });
    let videos = item.videos.iter().enumerate().map(|(i, url)| MediaChip {
        kind: MediaKind::Video,
        label: format!("Video {}", i + 1),
        url: url.clone(),
    });
    let links = item.links.iter().map(|link| MediaChip {
        kind: MediaKind::Link,
        label: if link.label.is_empty() {
            "Link".to_string()
        } else {
            link.label.clone()
        },
        url: link.url.clone(),
    });

    let chips: Vec<MediaChip> = images.chain(videos).chain(links).take(MAX_MEDIA_CHIPS).collect();
    let overflow = item.media_count().saturating_sub(chips.len());
    (chips, overflow)
}

/// `1 Sep 2023` style date; the raw string when unparsable.
#[must_use]
pub fn format_date(raw: &str) -> String {
    parse_date(raw).map_or_else(
        || raw.to_string(),
        |d| format!("{} {} {}", d.day(), MONTHS[d.month0() as usize], d.year()),
    )
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// How the next view replaces the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Immediate,
    CrossFade(Duration),
}

/// Holds the shown view and, during a cross-fade, the staged one.
#[derive(Debug, Clone)]
pub struct Screen {
    shown: RenderedTimeline,
    staged: Option<RenderedTimeline>,
    reduce_motion: bool,
    initial_render_done: bool,
    duration: Duration,
}

impl Screen {
    #[must_use]
    pub fn new(reduce_motion: bool, duration: Duration) -> Self {
        Self {
            shown: RenderedTimeline::default(),
            staged: None,
            reduce_motion,
            initial_render_done: false,
            duration,
        }
    }

    /// Present `next`. A cross-fade stages it until [`Self::complete_swap`].
    ///
    /// The very first render, immediate renders and reduced motion skip the
    /// fade. A present during a running fade replaces the staged view.
    pub fn present(&mut self, next: RenderedTimeline, immediate: bool) -> Transition {
        let animate = !immediate && self.initial_render_done && !self.reduce_motion;
        self.initial_render_done = true;
        if animate {
            self.staged = Some(next);
            Transition::CrossFade(self.duration)
        } else {
            self.staged = None;
            self.shown = next;
            Transition::Immediate
        }
    }

    /// Swap in the staged view. Returns `false` when nothing was staged.
    pub fn complete_swap(&mut self) -> bool {
        match self.staged.take() {
            Some(next) => {
                self.shown = next;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub const fn shown(&self) -> &RenderedTimeline {
        &self.shown
    }

    /// True while the outgoing view is fading.
    #[must_use]
    pub const fn is_fading(&self) -> bool {
        self.staged.is_some()
    }

    #[must_use]
    pub const fn reduces_motion(&self) -> bool {
        self.reduce_motion
    }

    pub const fn set_reduce_motion(&mut self, reduce: bool) {
        self.reduce_motion = reduce;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Link};

    fn make_item(id: &str, date: &str, categories: &[&str]) -> TimelineItem {
        TimelineItem {
            id: id.into(),
            date: date.into(),
            year: None,
            title: format!("Title {id}"),
            summary: "Summary".into(),
            details: String::new(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            images: vec![],
            videos: vec![],
            links: vec![],
            keywords: vec![],
        }
    }

    #[test]
    fn groups_follow_first_encounter_order() {
        let items = vec![
            make_item("a", "2023-01-01", &[]),
            make_item("b", "2022-06-01", &[]),
            make_item("c", "2023-03-01", &[]),
        ];
        let out = render(&items, RenderOptions::default());
        let labels: Vec<&str> = out.year_labels().collect();
        assert_eq!(labels, ["2023", "2022"]);
        assert_eq!(out.groups[0].cards.len(), 2);
        assert_eq!(out.card_count(), 3);
    }

    #[test]
    fn empty_input_renders_empty_state() {
        assert!(render(&[], RenderOptions::default()).is_empty());
    }

    #[test]
    fn undated_items_get_their_own_group() {
        let out = render(&[make_item("x", "tbd", &[])], RenderOptions::default());
        assert_eq!(out.groups[0].label, UNDATED_LABEL);
        assert_eq!(out.groups[0].cards[0].date_label, "tbd");
    }

    #[test]
    fn card_carries_accent_and_sustainability() {
        let item = make_item("a", "2023-09-01", &["Creativity", "Sustainability"]);
        let out = render(&[item], RenderOptions { deletable: true });
        let card = &out.groups[0].cards[0];
        assert!(card.sustainability);
        assert!(card.deletable);
        assert_eq!(card.accent, Category::Creativity.accent());
        assert_eq!(card.date_label, "1 Sep 2023");
        assert_eq!(card.categories, ["Creativity", "Sustainability"]);
    }

    #[test]
    fn uncategorized_card_uses_default_accent() {
        let out = render(&[make_item("a", "2023-09-01", &[])], RenderOptions::default());
        assert_eq!(out.groups[0].cards[0].accent, DEFAULT_ACCENT);
    }

    #[test]
    fn single_image_is_unnumbered() {
        let mut item = make_item("a", "2023-09-01", &[]);
        item.images = vec!["img.png".into()];
        let (chips, overflow) = media_indicators(&item);
        assert_eq!(chips[0].label, "Image");
        assert_eq!(overflow, 0);
    }

    #[test]
    fn media_overflow_counts_the_rest() {
        let mut item = make_item("a", "2023-09-01", &[]);
        item.images = vec!["1.png".into(), "2.png".into()];
        item.videos = vec!["v.mp4".into()];
        item.links = vec![Link {
            label: String::new(),
            url: "https://x".into(),
        }];
        let (chips, overflow) = media_indicators(&item);
        let labels: Vec<&str> = chips.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Image 1", "Image 2"]);
        assert_eq!(overflow, 2);
    }

    #[test]
    fn videos_then_links_fill_remaining_slots() {
        let mut item = make_item("a", "2023-09-01", &[]);
        item.videos = vec!["v.mp4".into()];
        item.links = vec![Link {
            label: String::new(),
            url: "https://x".into(),
        }];
        let (chips, overflow) = media_indicators(&item);
        assert_eq!(chips[0].label, "Video 1");
        assert_eq!(chips[1].label, "Link");
        assert_eq!(chips[1].kind, MediaKind::Link);
        assert_eq!(overflow, 0);
    }

    #[test]
    fn format_date_falls_back_to_raw() {
        assert_eq!(format_date("2024-12-25"), "25 Dec 2024");
        assert_eq!(format_date("Spring"), "Spring");
    }

    #[test]
    fn first_render_is_immediate_then_fades() {
        let mut screen = Screen::new(false, TRANSITION);
        let first = render(&[make_item("a", "2023-01-01", &[])], RenderOptions::default());
        assert_eq!(screen.present(first.clone(), false), Transition::Immediate);
        assert_eq!(screen.shown(), &first);

        let second = RenderedTimeline::default();
        assert_eq!(
            screen.present(second.clone(), false),
            Transition::CrossFade(TRANSITION)
        );
        assert!(screen.is_fading());
        assert_eq!(screen.shown(), &first);
        assert!(screen.complete_swap());
        assert_eq!(screen.shown(), &second);
        assert!(!screen.complete_swap());
    }

    #[test]
    fn reduced_motion_and_immediate_skip_fade() {
        let mut screen = Screen::new(true, TRANSITION);
        screen.present(RenderedTimeline::default(), false);
        assert_eq!(
            screen.present(RenderedTimeline::default(), false),
            Transition::Immediate
        );

        let mut screen = Screen::new(false, TRANSITION);
        screen.present(RenderedTimeline::default(), false);
        assert_eq!(
            screen.present(RenderedTimeline::default(), true),
            Transition::Immediate
        );
    }

    #[test]
    fn immediate_present_cancels_staged_fade() {
        let mut screen = Screen::new(false, TRANSITION);
        screen.present(RenderedTimeline::default(), false);
        let staged = render(&[make_item("a", "2023-01-01", &[])], RenderOptions::default());
        screen.present(staged, false);
        let now = render(&[make_item("b", "2021-01-01", &[])], RenderOptions::default());
        screen.present(now.clone(), true);
        assert!(!screen.is_fading());
        assert_eq!(screen.shown(), &now);
    }
}
