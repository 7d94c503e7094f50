//! Window creation and winit event handling.

use std::sync::Arc;

use stardrift_config::Config;
use tracing::{error, info, instrument};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::backdrop::{Backdrop, BackdropSettings};

pub fn window_attributes_from_config(config: &Config) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(config.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(
            config.window.width as f64,
            config.window.height as f64,
        ))
}

/// Host state: the window and the backdrop painted into it.
pub struct AppState {
    pub window: Option<Arc<Window>>,
    pub backdrop: Backdrop,
    pub config: Config,
}

impl AppState {
    pub fn with_config(config: Config) -> Self {
        Self {
            window: None,
            backdrop: Backdrop::new(BackdropSettings::from_config(&config)),
            config,
        }
    }

    fn request_redraw(&self) {
        if self.backdrop.request_frame()
            && let Some(window) = &self.window
        {
            window.request_redraw();
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = window_attributes_from_config(&self.config);
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        // A failed mount leaves an empty window; the backdrop is decoration.
        self.backdrop.mount(window.clone());
        self.window = Some(window);
        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.backdrop.unmount();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.backdrop.resize(new_size.width, new_size.height);
                if let Some(window) = &self.window {
                    self.backdrop.sync_theme(window.theme());
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(window) = &self.window {
                    let inner = window.inner_size();
                    self.backdrop
                        .set_scale_factor(scale_factor, inner.width, inner.height);
                }
            }
            WindowEvent::ThemeChanged(theme) => {
                self.backdrop.sync_theme(Some(theme));
            }
            WindowEvent::RedrawRequested => {
                if self.backdrop.frame() {
                    self.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.backdrop.unmount();
    }
}

/// Creates an event loop and runs the backdrop with the given config.
///
/// This function blocks until the window is closed.
#[instrument(skip(config))]
pub fn run(config: Config) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::new()?;
    let mut app = AppState::with_config(config);
    event_loop.run_app(&mut app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_default() {
        let state = AppState::default();
        assert!(state.window.is_none());
        assert!(!state.backdrop.is_mounted());
    }

    #[test]
    fn test_config_reaches_backdrop() {
        let mut config = Config::default();
        config.background.star_count = 42;
        let state = AppState::with_config(config);
        assert_eq!(state.backdrop.settings().simulation.starfield.count, 42);
    }

    #[test]
    fn test_redraw_without_window_is_harmless() {
        let mut state = AppState::default();
        state.request_redraw();
        assert!(!state.backdrop.frame());
    }

    #[test]
    fn test_window_builder_defaults() {
        let _attrs = window_attributes_from_config(&Config::default());
    }
}
