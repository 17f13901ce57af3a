//! Chat panel: the viewer types, the avatar answers with a canned reply
//! after a short delay and speaks it.

use crate::replies::{HINT_LINE, OPENING_LINES, make_reply};
use crate::settings::{self, SettingsResource};
use avatar::compositor::AvatarState;
use avatar::messages::AvatarCommand;
use avatar::pipeline::AvatarPipeline;
use avatar::settings::SpeechSettings;
use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPrimaryContextPass, egui};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

const MAX_LOG_ENTRIES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Viewer,
    Avatar,
    System,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingReply {
    text: String,
    due: f32,
}

#[derive(Resource, Debug, Default)]
pub struct ChatState {
    entries: Vec<ChatEntry>,
    pending: VecDeque<PendingReply>,
    draft: String,
}

impl ChatState {
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.entries.push(ChatEntry {
            speaker,
            text: text.into(),
        });
        if self.entries.len() > MAX_LOG_ENTRIES {
            let overflow = self.entries.len() - MAX_LOG_ENTRIES;
            self.entries.drain(..overflow);
        }
    }

    /// Logs the viewer's line and queues the avatar's answer. Blank input is
    /// ignored and returns `None`.
    pub fn submit<R: Rng>(&mut self, text: &str, now: f32, delay: f32, rng: &mut R) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.push(Speaker::Viewer, text);
        self.pending.push_back(PendingReply {
            text: make_reply(text, rng),
            due: now + delay.max(0.0),
        });
        Some(text.to_string())
    }

    /// Replies whose delay has elapsed, oldest first.
    pub fn take_due(&mut self, now: f32) -> Vec<String> {
        let mut due = Vec::new();
        while self.pending.front().is_some_and(|reply| reply.due <= now) {
            if let Some(reply) = self.pending.pop_front() {
                due.push(reply.text);
            }
        }
        due
    }
}

pub struct ChatPlugin;

impl Plugin for ChatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ChatState>()
            .add_systems(Startup, greet_viewer)
            .add_systems(Update, release_replies.before(AvatarPipeline::Events))
            .add_systems(EguiPrimaryContextPass, draw_chat_window);
    }
}

fn greet_viewer(mut chat: ResMut<ChatState>, mut commands: MessageWriter<AvatarCommand>) {
    let opening = OPENING_LINES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(OPENING_LINES[0]);
    chat.push(Speaker::Avatar, opening);
    chat.push(Speaker::System, HINT_LINE);
    commands.write(AvatarCommand::Speak {
        text: opening.to_string(),
    });
}

fn release_replies(time: Res<Time>, mut chat: ResMut<ChatState>, mut commands: MessageWriter<AvatarCommand>) {
    for text in chat.take_due(time.elapsed_secs()) {
        chat.push(Speaker::Avatar, text.clone());
        commands.write(AvatarCommand::Speak { text });
    }
}

fn apply_chat_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.spacing.item_spacing = egui::vec2(10.0, 8.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);
    style.spacing.window_margin = egui::Margin::same(12);
    style.visuals.window_corner_radius = egui::CornerRadius::same(12);
    style.visuals.widgets.active.corner_radius = egui::CornerRadius::same(8);
    style.visuals.widgets.hovered.corner_radius = egui::CornerRadius::same(8);
    style.visuals.widgets.inactive.corner_radius = egui::CornerRadius::same(8);
    ctx.set_style(style);
}

fn draw_chat_window(
    mut contexts: EguiContexts,
    time: Res<Time>,
    avatar_state: Res<AvatarState>,
    mut chat: ResMut<ChatState>,
    mut settings_resource: ResMut<SettingsResource>,
    mut commands: MessageWriter<AvatarCommand>,
    mut theme_initialized: Local<bool>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };
    if !*theme_initialized {
        apply_chat_theme(ctx);
        *theme_initialized = true;
    }

    let mut send = false;
    let mut stop = false;
    let mut tuning_changed = false;
    let mut tuning_released = false;
    let mut pitch = settings_resource.current.avatar.speech.pitch;
    let mut rate = settings_resource.current.avatar.speech.rate;

    egui::Window::new("Chat")
        .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-16.0, -16.0))
        .collapsible(true)
        .resizable(false)
        .default_width(360.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .max_height(280.0)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for entry in chat.entries() {
                        let (label, color) = match entry.speaker {
                            Speaker::Viewer => ("You", egui::Color32::from_rgb(150, 200, 255)),
                            Speaker::Avatar => ("Avatar", egui::Color32::from_rgb(255, 182, 214)),
                            Speaker::System => ("", egui::Color32::GRAY),
                        };
                        ui.horizontal_wrapped(|ui| {
                            if !label.is_empty() {
                                ui.colored_label(color, format!("{label}:"));
                            }
                            ui.label(&entry.text);
                        });
                    }
                });

            ui.separator();
            ui.horizontal(|ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut chat.draft)
                        .desired_width(250.0)
                        .hint_text("메시지를 입력하세요"),
                );
                let entered = response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
                send = ui.button("Send").clicked() || entered;
                if entered {
                    response.request_focus();
                }
            });

            ui.separator();
            let pitch_response = ui.add(egui::Slider::new(&mut pitch, 0.0..=2.0).text("Pitch"));
            let rate_response = ui.add(egui::Slider::new(&mut rate, 0.5..=2.0).text("Rate"));
            tuning_changed = pitch_response.changed() || rate_response.changed();
            tuning_released = pitch_response.drag_stopped() || rate_response.drag_stopped();

            ui.horizontal(|ui| {
                stop = ui.button("Stop").clicked();
                if avatar_state.is_speaking() {
                    ui.label("speaking…");
                }
            });
        });

    if send {
        let draft = std::mem::take(&mut chat.draft);
        let delay = settings_resource.current.voice.reply_delay_secs;
        if let Some(text) = chat.submit(&draft, time.elapsed_secs(), delay, &mut rand::thread_rng()) {
            commands.write(AvatarCommand::UserMessage { text });
        }
    }

    if stop {
        commands.write(AvatarCommand::StopSpeaking);
    }

    if tuning_changed {
        let speech = &mut settings_resource.current.avatar.speech;
        speech.pitch = SpeechSettings::clamp_pitch(pitch);
        speech.rate = SpeechSettings::clamp_rate(rate);
        commands.write(AvatarCommand::SetVoiceTuning {
            pitch: speech.pitch,
            rate: speech.rate,
        });
    }
    if tuning_released && let Err(error) = settings_resource.save_to_disk() {
        warn!(
            "Failed to save settings file '{}': {}",
            settings::SETTINGS_FILE_PATH,
            error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn replies_wait_for_their_delay() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut chat = ChatState::default();

        assert_eq!(chat.submit("  안녕  ", 1.0, 0.25, &mut rng).as_deref(), Some("안녕"));
        assert_eq!(chat.entries()[0].speaker, Speaker::Viewer);
        assert!(chat.take_due(1.1).is_empty());

        let due = chat.take_due(1.3);
        assert_eq!(due.len(), 1);
        assert!(chat.take_due(10.0).is_empty());
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut chat = ChatState::default();
        assert_eq!(chat.submit("   ", 0.0, 0.25, &mut rng), None);
        assert!(chat.entries().is_empty());
        assert!(chat.take_due(5.0).is_empty());
    }

    #[test]
    fn log_keeps_the_latest_entries() {
        let mut chat = ChatState::default();
        for index in 0..(MAX_LOG_ENTRIES + 5) {
            chat.push(Speaker::System, index.to_string());
        }
        assert_eq!(chat.entries().len(), MAX_LOG_ENTRIES);
        assert_eq!(chat.entries()[0].text, "5");
    }
}
