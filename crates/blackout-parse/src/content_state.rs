//! Graphics and text state tracking while walking a content stream.
//!
//! Implements the parts of the PDF state model that decide where marks land
//! on the page: the CTM stack (`q`, `Q`, `cm`), the text object (`BT`,
//! `ET`), the text matrices (`Tm`, `Td`, `TD`, `T*`), and the text state
//! parameters (`Tf`, `Tc`, `Tw`, `Tz`, `TL`, `Ts`). Colours, line styles,
//! and clipping are not tracked.

use blackout_core::Ctm;

/// Text state parameters saved and restored with the graphics state.
#[derive(Debug, Clone, PartialEq)]
pub struct TextParams {
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Horizontal scaling as a percentage (100 = normal).
    pub h_scaling: f64,
    pub leading: f64,
    pub font_name: String,
    pub font_size: f64,
    pub rise: f64,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scaling: 100.0,
            leading: 0.0,
            font_name: String::new(),
            font_size: 0.0,
            rise: 0.0,
        }
    }
}

impl TextParams {
    pub fn h_scale(&self) -> f64 {
        self.h_scaling / 100.0
    }
}

#[derive(Debug, Clone)]
struct Saved {
    ctm: Ctm,
    text: TextParams,
}

/// Interpreter state for one content stream.
#[derive(Debug, Clone, Default)]
pub struct ContentState {
    ctm: Ctm,
    text: TextParams,
    stack: Vec<Saved>,
    in_text: bool,
    text_matrix: Ctm,
    line_matrix: Ctm,
}

impl ContentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a base matrix, for example a form XObject's `/Matrix`
    /// composed with the invoking CTM.
    pub fn with_ctm(ctm: Ctm) -> Self {
        Self {
            ctm,
            ..Self::default()
        }
    }

    pub fn ctm(&self) -> &Ctm {
        &self.ctm
    }

    pub fn text(&self) -> &TextParams {
        &self.text
    }

    pub fn text_mut(&mut self) -> &mut TextParams {
        &mut self.text
    }

    pub fn text_matrix(&self) -> &Ctm {
        &self.text_matrix
    }

    pub fn in_text_object(&self) -> bool {
        self.in_text
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// `q`
    pub fn save(&mut self) {
        self.stack.push(Saved {
            ctm: self.ctm,
            text: self.text.clone(),
        });
    }

    /// `Q`. Returns `false` on an unbalanced restore, which is ignored.
    pub fn restore(&mut self) -> bool {
        match self.stack.pop() {
            Some(saved) => {
                self.ctm = saved.ctm;
                self.text = saved.text;
                true
            }
            None => false,
        }
    }

    /// `cm`: CTM' = M x CTM.
    pub fn concat(&mut self, m: Ctm) {
        self.ctm = m.concat(&self.ctm);
    }

    /// `BT`
    pub fn begin_text(&mut self) {
        self.in_text = true;
        self.text_matrix = Ctm::identity();
        self.line_matrix = Ctm::identity();
    }

    /// `ET`
    pub fn end_text(&mut self) {
        self.in_text = false;
    }

    /// `Tm`
    pub fn set_text_matrix(&mut self, m: Ctm) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    /// `Td`
    pub fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Ctm::new(1.0, 0.0, 0.0, 1.0, tx, ty).concat(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// `TD`
    pub fn move_line_set_leading(&mut self, tx: f64, ty: f64) {
        self.text.leading = -ty;
        self.move_line(tx, ty);
    }

    /// `T*`
    pub fn next_line(&mut self) {
        let leading = self.text.leading;
        self.move_line(0.0, -leading);
    }

    /// Move the text matrix along the baseline by `tx` text space units.
    pub fn advance(&mut self, tx: f64) {
        self.text_matrix = Ctm::new(1.0, 0.0, 0.0, 1.0, tx, 0.0).concat(&self.text_matrix);
    }

    /// Text rendering matrix for the current position without the font size
    /// factor: `[Th 0 0 1 0 Trise] x Tm x CTM`.
    pub fn text_to_user(&self) -> Ctm {
        Ctm::new(self.text.h_scale(), 0.0, 0.0, 1.0, 0.0, self.text.rise)
            .concat(&self.text_matrix)
            .concat(&self.ctm)
    }

    /// Apply a text or graphics state operator. Returns `true` when the
    /// operator was recognised as one this state tracks.
    pub fn apply(&mut self, name: &str, nums: &[f64], font: Option<&str>) -> bool {
        let n = |i: usize| nums.get(i).copied().unwrap_or(0.0);
        match name {
            "q" => self.save(),
            "Q" => {
                self.restore();
            }
            "cm" if nums.len() >= 6 => self.concat(Ctm::new(n(0), n(1), n(2), n(3), n(4), n(5))),
            "BT" => self.begin_text(),
            "ET" => self.end_text(),
            "Tm" if nums.len() >= 6 => {
                self.set_text_matrix(Ctm::new(n(0), n(1), n(2), n(3), n(4), n(5)));
            }
            "Td" => self.move_line(n(0), n(1)),
            "TD" => self.move_line_set_leading(n(0), n(1)),
            "T*" => self.next_line(),
            "Tc" => self.text.char_spacing = n(0),
            "Tw" => self.text.word_spacing = n(0),
            "Tz" => self.text.h_scaling = n(0),
            "TL" => self.text.leading = n(0),
            "Ts" => self.text.rise = n(0),
            "Tf" => {
                if let Some(font) = font {
                    self.text.font_name = font.to_string();
                }
                self.text.font_size = nums.last().copied().unwrap_or(0.0);
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn save_restore_preserves_ctm_and_text_params() {
        let mut s = ContentState::new();
        s.text_mut().font_size = 12.0;
        s.save();
        s.concat(Ctm::new(2.0, 0.0, 0.0, 2.0, 10.0, 10.0));
        s.text_mut().font_size = 20.0;
        assert!(s.restore());
        assert_eq!(*s.ctm(), Ctm::identity());
        assert_eq!(s.text().font_size, 12.0);
        assert!(!s.restore());
    }

    #[test]
    fn cm_pre_multiplies() {
        let mut s = ContentState::new();
        s.concat(Ctm::new(1.0, 0.0, 0.0, 1.0, 100.0, 200.0));
        s.concat(Ctm::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
        let (x, y) = s.ctm().transform_point(1.0, 1.0);
        assert_approx(x, 102.0);
        assert_approx(y, 202.0);
    }

    #[test]
    fn td_and_t_star() {
        let mut s = ContentState::new();
        s.begin_text();
        s.move_line(72.0, 720.0);
        s.apply("TL", &[14.0], None);
        s.next_line();
        assert_approx(s.text_matrix().e, 72.0);
        assert_approx(s.text_matrix().f, 706.0);
    }

    #[test]
    fn td_uppercase_sets_leading() {
        let mut s = ContentState::new();
        s.begin_text();
        s.move_line_set_leading(0.0, -15.0);
        assert_eq!(s.text().leading, 15.0);
    }

    #[test]
    fn advance_moves_along_baseline() {
        let mut s = ContentState::new();
        s.begin_text();
        s.set_text_matrix(Ctm::new(1.0, 0.0, 0.0, 1.0, 50.0, 50.0));
        s.advance(10.0);
        assert_approx(s.text_matrix().e, 60.0);
        assert_approx(s.text_matrix().f, 50.0);
    }

    #[test]
    fn text_to_user_includes_scaling_and_rise() {
        let mut s = ContentState::new();
        s.begin_text();
        s.apply("Tz", &[50.0], None);
        s.apply("Ts", &[3.0], None);
        s.set_text_matrix(Ctm::new(1.0, 0.0, 0.0, 1.0, 10.0, 20.0));
        let (x, y) = s.text_to_user().transform_point(4.0, 0.0);
        assert_approx(x, 12.0);
        assert_approx(y, 23.0);
    }

    #[test]
    fn tf_records_font() {
        let mut s = ContentState::new();
        assert!(s.apply("Tf", &[9.0], Some("F2")));
        assert_eq!(s.text().font_name, "F2");
        assert_eq!(s.text().font_size, 9.0);
        assert!(!s.apply("re", &[0.0, 0.0, 1.0, 1.0], None));
    }
}
