//! Access to game-specific raw data.

use std::sync::Arc;

use tracing::info;

use super::model::{AccGraphics, AccPhysics, AccRawData, RawData};

/// Tracks the raw data block of the running game.
///
/// Must be updated once per tick before the raw pages are read; a tick
/// without raw data clears everything.
#[derive(Debug, Default)]
pub struct RawDataManager {
    current_game: Option<String>,
    acc: Option<Arc<AccRawData>>,
}

impl RawDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, raw: Option<&RawData>) {
        let Some(raw) = raw else {
            self.reset();
            return;
        };

        if self.current_game.as_deref() != Some(raw.game()) {
            self.reset();
            self.current_game = Some(raw.game().to_string());
            info!(game = %raw.game(), "Detected a new game");

            match raw {
                RawData::Acc(_) => info!("New game is ACC"),
                RawData::Unsupported { game } => info!(
                    game = %game,
                    "Don't know how to handle raw data of this game, raw properties are unavailable"
                ),
            }
        }

        self.acc = match raw {
            RawData::Acc(data) => Some(Arc::clone(data)),
            RawData::Unsupported { .. } => None,
        };
    }

    /// Identifier of the game detected on the last update.
    pub fn current_game(&self) -> Option<&str> {
        self.current_game.as_deref()
    }

    pub fn acc_graphics(&self) -> Option<&AccGraphics> {
        self.acc.as_deref().map(|acc| &acc.graphics)
    }

    pub fn acc_physics(&self) -> Option<&AccPhysics> {
        self.acc.as_deref().map(|acc| &acc.physics)
    }

    fn reset(&mut self) {
        self.current_game = None;
        self.acc = None;
    }
}
