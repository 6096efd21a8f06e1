//! Overlay panel contents. Drawing the widgets is left to the host.

use crate::scene::{AtmosphereParams, SceneKind};
use crate::state::RendererState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliderId {
    InScatterPoints,
    OpticalDepthPoints,
    DensityFalloff,
    WavelengthRed,
    WavelengthGreen,
    WavelengthBlue,
    ScatteringStrength,
}

impl SliderId {
    pub const ALL: [SliderId; 7] = [
        SliderId::InScatterPoints,
        SliderId::OpticalDepthPoints,
        SliderId::DensityFalloff,
        SliderId::WavelengthRed,
        SliderId::WavelengthGreen,
        SliderId::WavelengthBlue,
        SliderId::ScatteringStrength,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::InScatterPoints => "Measurements",
            Self::OpticalDepthPoints => "Optical depths",
            Self::DensityFalloff => "Density falloff",
            Self::WavelengthRed => "Wavelength R",
            Self::WavelengthGreen => "Wavelength G",
            Self::WavelengthBlue => "Wavelength B",
            Self::ScatteringStrength => "Scattering strength",
        }
    }

    /// Inclusive value range.
    pub fn range(self) -> (f32, f32) {
        match self {
            Self::InScatterPoints | Self::OpticalDepthPoints => (1.0, 30.0),
            Self::DensityFalloff => (0.0, 20.0),
            Self::WavelengthRed | Self::WavelengthGreen | Self::WavelengthBlue => (300.0, 800.0),
            Self::ScatteringStrength => (0.0, 40.0),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::InScatterPoints | Self::OpticalDepthPoints)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slider {
    pub id: SliderId,
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl Slider {
    pub fn label(&self) -> &'static str {
        self.id.label()
    }
}

/// What the overlay shows this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Scattering parameters, shown only for the space scene with the menu on.
    Atmosphere(Vec<Slider>),
    Hint(String),
}

impl Overlay {
    pub fn build(state: &RendererState, atmosphere: &AtmosphereParams) -> Self {
        match (state.active, state.show_menu) {
            (SceneKind::Space, true) => Self::Atmosphere(
                SliderId::ALL
                    .iter()
                    .map(|&id| {
                        let (min, max) = id.range();
                        Slider {
                            id,
                            value: atmosphere.slider_value(id),
                            min,
                            max,
                        }
                    })
                    .collect(),
            ),
            (SceneKind::Space, false) => {
                Self::Hint("Press M for atmosphere settings, T for the room".to_string())
            }
            (SceneKind::Room, _) => Self::Hint("Press T to return to space".to_string()),
        }
    }

    /// One-line rendering used as the window title.
    pub fn title(&self) -> String {
        match self {
            Self::Hint(text) => format!("PlanetGL | {text}"),
            Self::Atmosphere(sliders) => {
                let values: Vec<String> = sliders
                    .iter()
                    .map(|slider| {
                        if slider.id.is_integer() {
                            format!("{} {}", slider.label(), slider.value as u32)
                        } else {
                            format!("{} {:.1}", slider.label(), slider.value)
                        }
                    })
                    .collect();
                format!("PlanetGL | {}", values.join(" | "))
            }
        }
    }
}

impl AtmosphereParams {
    pub fn slider_value(&self, id: SliderId) -> f32 {
        match id {
            SliderId::InScatterPoints => self.in_scatter_points as f32,
            SliderId::OpticalDepthPoints => self.optical_depth_points as f32,
            SliderId::DensityFalloff => self.density_falloff,
            SliderId::WavelengthRed => self.wavelengths[0],
            SliderId::WavelengthGreen => self.wavelengths[1],
            SliderId::WavelengthBlue => self.wavelengths[2],
            SliderId::ScatteringStrength => self.scattering_strength,
        }
    }

    /// Stores `value` clamped into the slider's range; returns what was stored.
    pub fn apply_slider(&mut self, id: SliderId, value: f32) -> f32 {
        let (min, max) = id.range();
        let mut value = if value.is_nan() { min } else { value.clamp(min, max) };
        if id.is_integer() {
            value = value.round();
        }
        match id {
            SliderId::InScatterPoints => self.in_scatter_points = value as u32,
            SliderId::OpticalDepthPoints => self.optical_depth_points = value as u32,
            SliderId::DensityFalloff => self.density_falloff = value,
            SliderId::WavelengthRed => self.wavelengths[0] = value,
            SliderId::WavelengthGreen => self.wavelengths[1] = value,
            SliderId::WavelengthBlue => self.wavelengths[2] = value,
            SliderId::ScatteringStrength => self.scattering_strength = value,
        }
        value
    }
}
