//! Screen adaptation performed once when the layers are built.

use tracing::{info, warn};

/// A width and height in design units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Size {
    /// Creates a size.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    /// Whether both dimensions are finite and positive.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Window information consulted when the layers are built.
pub trait Screen {
    /// Size of the window.
    fn window_size(&self) -> Size;

    /// Design resolution the UI was authored for.
    fn design_resolution(&self) -> Size;

    /// Replaces the design resolution with the adapted one.
    fn set_design_resolution(&mut self, size: Size);
}

/// A [`Screen`] with fixed sizes, for headless hosts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScreen {
    /// Size of the window.
    pub window: Size,
    /// Current design resolution.
    pub design: Size,
}

impl FixedScreen {
    /// Creates a screen.
    pub fn new(window: Size, design: Size) -> Self {
        Self { window, design }
    }
}

impl Screen for FixedScreen {
    fn window_size(&self) -> Size {
        self.window
    }

    fn design_resolution(&self) -> Size {
        self.design
    }

    fn set_design_resolution(&mut self, size: Size) {
        self.design = size;
    }
}

/// Which design dimension is kept when the window aspect ratio differs from the design one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPolicy {
    /// The design height is kept and the width grows (landscape windows).
    FitHeight,
    /// The design width is kept and the height grows (portrait windows).
    FitWidth,
}

/// Outcome of the screen adaptation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionFit {
    /// The chosen policy.
    pub policy: FitPolicy,
    /// Window width divided by window height.
    pub window_aspect_ratio: f32,
    /// Design width divided by design height.
    pub design_aspect_ratio: f32,
    /// The adapted design resolution.
    pub design_size: Size,
}

impl ResolutionFit {
    /// Picks the policy for a window and a design resolution.
    ///
    /// A window wider than the design fits the design height, anything else fits the design
    /// width. The other dimension is stretched so that the design has the window's aspect ratio.
    ///
    /// When either size has a zero, negative or non-finite dimension the design resolution is
    /// kept as it is, the policy is [`FitPolicy::FitWidth`] and the ratio of the unusable size is
    /// reported as `0.0`.
    pub fn compute(window: Size, design: Size) -> Self {
        if !window.is_usable() || !design.is_usable() {
            warn!(
                "Cannot fit a {}x{} design to a {}x{} window, keeping the design resolution",
                design.width, design.height, window.width, window.height
            );
            let ratio = |size: Size| if size.is_usable() { size.aspect_ratio() } else { 0.0 };
            return Self {
                policy: FitPolicy::FitWidth,
                window_aspect_ratio: ratio(window),
                design_aspect_ratio: ratio(design),
                design_size: design,
            };
        }

        let window_aspect_ratio = window.aspect_ratio();
        let design_aspect_ratio = design.aspect_ratio();

        if window_aspect_ratio > design_aspect_ratio {
            let height = design.height;
            Self {
                policy: FitPolicy::FitHeight,
                window_aspect_ratio,
                design_aspect_ratio,
                design_size: Size::new(height * window.width / window.height, height),
            }
        } else {
            let width = design.width;
            Self {
                policy: FitPolicy::FitWidth,
                window_aspect_ratio,
                design_aspect_ratio,
                design_size: Size::new(width, width * window.height / window.width),
            }
        }
    }
}

/// Adapts the screen's design resolution and logs the decision.
pub fn adapt_screen(screen: &mut dyn Screen) -> ResolutionFit {
    let fit = ResolutionFit::compute(screen.window_size(), screen.design_resolution());

    match fit.policy {
        FitPolicy::FitHeight => info!("Fit height / landscape"),
        FitPolicy::FitWidth => info!("Fit width / portrait"),
    }

    screen.set_design_resolution(fit.design_size);
    fit
}

#[cfg(test)]
mod tests {
    use assert2::assert;
    use tracing_test::traced_test;

    use super::{adapt_screen, FitPolicy, FixedScreen, ResolutionFit, Screen, Size};

    #[test]
    fn wide_window_fits_height() {
        let fit = ResolutionFit::compute(Size::new(1920.0, 1080.0), Size::new(1280.0, 864.0));

        assert!(fit.policy == FitPolicy::FitHeight);
        assert!(fit.design_size.height == 864.0);
        assert!((fit.design_size.width - 1536.0).abs() < 0.01);
    }

    #[test]
    fn tall_window_fits_width() {
        let fit = ResolutionFit::compute(Size::new(1080.0, 2400.0), Size::new(720.0, 1280.0));

        assert!(fit.policy == FitPolicy::FitWidth);
        assert!(fit.design_size.width == 720.0);
        assert!((fit.design_size.height - 1600.0).abs() < 0.01);
    }

    #[test]
    fn equal_ratios_fit_width() {
        let fit = ResolutionFit::compute(Size::new(1440.0, 2560.0), Size::new(720.0, 1280.0));

        assert!(fit.policy == FitPolicy::FitWidth);
        assert!(fit.design_size == Size::new(720.0, 1280.0));
    }

    #[test]
    fn adapted_resolution_is_written_back() {
        let mut screen = FixedScreen::new(Size::new(2000.0, 1000.0), Size::new(1000.0, 1000.0));

        let fit = adapt_screen(&mut screen);

        assert!(screen.design_resolution() == fit.design_size);
        assert!(screen.design_resolution() == Size::new(2000.0, 1000.0));
    }

    #[test]
    #[traced_test]
    fn zero_sized_window_keeps_the_design() {
        let mut screen = FixedScreen::new(Size::new(0.0, 0.0), Size::new(720.0, 1280.0));

        let fit = adapt_screen(&mut screen);

        assert!(fit.policy == FitPolicy::FitWidth);
        assert!(fit.window_aspect_ratio == 0.0);
        assert!(fit.design_aspect_ratio == 720.0 / 1280.0);
        assert!(screen.design_resolution() == Size::new(720.0, 1280.0));
        assert!(logs_contain("Cannot fit"));
    }

    #[test]
    #[traced_test]
    fn zero_height_design_is_not_stretched() {
        let fit = ResolutionFit::compute(Size::new(1080.0, 1920.0), Size::new(720.0, 0.0));

        assert!(fit.design_size == Size::new(720.0, 0.0));
        assert!(fit.design_aspect_ratio == 0.0);
        assert!(fit.window_aspect_ratio.is_finite());
    }
}
