use conversation::TranscriptBlock;
use eframe::egui;
use parking_lot::Mutex;
use shared::Role;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod simple_md;
mod state;
mod utils;

use state::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (settings, fresh) = utils::load_settings_or_default();
    if fresh {
        tracing::info!("no saved settings, using defaults");
    }
    let model_dir = utils::model_dir(&settings);
    let state = AppState::new(settings, utils::config_path(), model_dir);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Ember")
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([720.0, 520.0]),
        vsync: true,
        ..Default::default()
    };
    eframe::run_native(
        "Ember",
        options,
        Box::new(|_cc| {
            Box::new(EmberApp {
                state: Arc::new(Mutex::new(state)),
            })
        }),
    )
}

struct EmberApp {
    state: Arc<Mutex<AppState>>,
}

impl eframe::App for EmberApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut s = self.state.lock();

        // Repaint right away when the view changed, otherwise keep polling
        // at a slower pace while a turn or a transfer is running.
        if s.poll() {
            ctx.request_repaint();
        } else if s.is_busy() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }

        let dark = ctx.style().visuals.dark_mode;

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            render_model_bar(&mut s, ui);
            ui.add_space(4.0);
        });

        egui::SidePanel::left("threads")
            .resizable(false)
            .default_width(180.0)
            .show(ctx, |ui| render_thread_list(&mut s, ui));

        egui::TopBottomPanel::bottom("composer").show(ctx, |ui| {
            ui.add_space(6.0);
            render_composer(&mut s, ui);
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let blocks = &s.transcript;
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    if blocks.is_empty() {
                        ui.add_space(24.0);
                        ui.vertical_centered(|ui| {
                            ui.label(egui::RichText::new("Ask Ember anything.").size(16.0).weak());
                        });
                    }
                    for block in blocks {
                        ui.add_space(6.0);
                        render_block(ui, block, dark);
                        ui.add_space(6.0);
                    }
                });
        });
    }
}

fn render_model_bar(s: &mut AppState, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        ui.heading("Ember");
        ui.separator();

        match s.offered_models() {
            Ok(models) => {
                let selected_label = s
                    .selected_details()
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| "Select a model".to_string());
                let mut picked: Option<String> = None;
                egui::ComboBox::from_id_source("model_picker")
                    .selected_text(selected_label)
                    .width(220.0)
                    .show_ui(ui, |ui| {
                        for model in &models {
                            let is_selected = s.selected_model.as_deref() == Some(model.short_name.as_str());
                            if ui.selectable_label(is_selected, &model.name).clicked() {
                                picked = Some(model.short_name.clone());
                            }
                        }
                    });
                if let Some(name) = picked {
                    s.select_model(&name);
                }

                let busy = s.session.is_generating() || s.transfer.is_some();
                let action = match s.selected_details() {
                    Some(m) if !m.is_downloaded => "Download",
                    _ => "Load",
                };
                if ui.add_enabled(!busy, egui::Button::new(action)).clicked() {
                    s.load_selected();
                }
                if let Some(model) = s.selected_details() {
                    ui.label("ⓘ").on_hover_text(&model.notice);
                }
            }
            Err(msg) => {
                ui.colored_label(egui::Color32::from_rgb(220, 120, 80), msg);
            }
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(egui::RichText::new(s.memory_line()).small().weak());
        });
    });

    let mut cancel = false;
    if let Some(transfer) = s.transfer.as_ref() {
        ui.horizontal(|ui| {
            ui.add(
                egui::ProgressBar::new(transfer.percent as f32 / 100.0)
                    .desired_width(260.0)
                    .show_percentage(),
            );
            ui.label(egui::RichText::new(&transfer.status).small());
            cancel = ui.small_button("Cancel").clicked();
        });
    }
    if cancel {
        s.cancel_transfer();
    }
}

fn render_thread_list(s: &mut AppState, ui: &mut egui::Ui) {
    let idle = !s.session.is_generating();
    ui.add_space(6.0);
    if ui
        .add_enabled(idle, egui::Button::new("+ New Convo"))
        .on_hover_text("Start a fresh conversation")
        .clicked()
    {
        s.new_thread();
    }
    ui.separator();

    let threads = s.visible_threads();
    let mut switch_to = None;
    let mut delete = None;

    egui::ScrollArea::vertical().show(ui, |ui| {
        for thread in &threads {
            ui.horizontal(|ui| {
                let label = egui::SelectableLabel::new(thread.is_active, &thread.label);
                if ui.add_enabled(idle, label).clicked() {
                    switch_to = Some(thread.index);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .add_enabled(idle, egui::Button::new("🗑").small())
                        .on_hover_text("Delete this conversation")
                        .clicked()
                    {
                        delete = Some(thread.index);
                    }
                });
            });
        }
        if s.has_more_threads() && ui.link("See more").clicked() {
            s.see_more();
        }
    });

    if let Some(index) = switch_to {
        s.switch_thread(index);
    }
    if let Some(index) = delete {
        s.delete_thread(index);
    }
}

fn render_composer(s: &mut AppState, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        let mut creativity = s.settings.creativity;
        let resp = ui.add(egui::Slider::new(&mut creativity, 1.0..=100.0).text("Creativity"));
        if resp.changed() {
            s.set_creativity(creativity);
        }
        if resp.drag_released() {
            s.persist_settings();
        }

        let mut length = s.settings.token_length;
        let resp = ui.add(egui::Slider::new(&mut length, 0.0..=1.0).text("Length"));
        if resp.changed() {
            s.set_token_length(length);
        }
        if resp.drag_released() {
            s.persist_settings();
        }
        ui.label(
            egui::RichText::new(format!("max {} tokens", s.session.params().max_len))
                .small()
                .weak(),
        );
    });

    ui.add_space(4.0);
    let generating = s.session.is_generating();
    ui.horizontal(|ui| {
        let input = ui.add(
            egui::TextEdit::multiline(&mut s.input_text)
                .desired_rows(2)
                .desired_width(ui.available_width() - 90.0)
                .hint_text("Message Ember (Ctrl+Enter to send)"),
        );
        let shortcut =
            input.has_focus() && ui.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Enter));

        let label = if generating { "Cancel" } else { "Submit" };
        if ui.add_sized([80.0, 36.0], egui::Button::new(label)).clicked() || shortcut {
            s.submit();
        }
    });

    ui.horizontal(|ui| {
        if generating {
            ui.add(egui::Spinner::new().size(12.0));
        }
        ui.label(egui::RichText::new(s.session.status()).small().weak());
    });
}

fn render_block(ui: &mut egui::Ui, block: &TranscriptBlock, dark: bool) {
    let is_user = block.role == Role::User;
    let (fill, text_color) = match (is_user, dark) {
        (true, _) => (egui::Color32::from_rgb(70, 130, 180), egui::Color32::WHITE),
        (false, true) => (egui::Color32::from_rgb(50, 50, 58), egui::Color32::from_rgb(220, 220, 230)),
        (false, false) => (egui::Color32::from_rgb(245, 245, 248), egui::Color32::from_rgb(40, 40, 50)),
    };

    let paint = |ui: &mut egui::Ui| {
        egui::Frame::none()
            .fill(fill)
            .rounding(egui::Rounding::same(12.0))
            .inner_margin(egui::Margin::same(12.0))
            .show(ui, |ui| {
                ui.set_max_width(620.0);
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(block.speaker).strong().color(text_color));
                    if let Some(rate) = block.rate {
                        ui.label(
                            egui::RichText::new(format!("{:.1} tok/s", rate))
                                .small()
                                .color(text_color.gamma_multiply(0.7)),
                        );
                    }
                    if block.streaming {
                        ui.add(egui::Spinner::new().size(10.0));
                    }
                });
                ui.add_space(4.0);
                if is_user {
                    ui.label(egui::RichText::new(&block.body).size(14.0).color(text_color));
                } else {
                    simple_md::render_markdown(ui, &block.body, text_color);
                }
            });
    };

    if is_user {
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
            ui.add_space(8.0);
            paint(ui);
        });
    } else {
        paint(ui);
    }
}
