//! bevy + bevy_genai_chat demo: gemini chat with a single file attachment.
//! - type to edit the prompt; enter sends, shift+enter inserts a newline.
//! - drop a file on the window to attach it (one at a time).
//! - buttons: send, chat mode, anonymize (single-shot only), remove file,
//!   sidebar (usage + recommended prompts), about.
//!
//! config comes from env (`GEMINI_API_KEY`, `GENAI_MODEL`, ...) on native and
//! from the page query string on wasm.

use bevy::input::keyboard::{Key, KeyboardInput};
use bevy::prelude::*;
use bevy::window::FileDragAndDrop;
use bevy_genai_chat::{
    Action, ChatAction, ChatConfig, ChatErrorEvt, Controller, FileSource, GenaiChatPlugin,
    RequestMode, Role, Window as UsageWindow,
};

// ---------------------- ui tags ----------------------

#[derive(Component)]
struct ResponseText;
#[derive(Component)]
struct ResponseScroll;
#[derive(Component)]
struct PromptText;
#[derive(Component)]
struct FileText;
#[derive(Component)]
struct LoaderText;
#[derive(Component)]
struct UsageText(UsageWindow);
#[derive(Component)]
struct Sidebar;
#[derive(Component)]
struct AboutModal;

#[derive(Component, Clone, Copy)]
enum Btn {
    Send,
    Mode,
    Anonymize,
    RemoveFile,
    Sidebar,
    About,
    CloseAbout,
    Recommended(usize),
}

impl Btn {
    fn action(self, ctl: &Controller) -> Action {
        match self {
            Btn::Send => Action::Send,
            Btn::Mode => Action::ToggleMode,
            Btn::Anonymize => Action::SetAnonymize(!ctl.anonymize()),
            Btn::RemoveFile => Action::RemoveFile,
            Btn::Sidebar => Action::ToggleSidebar,
            Btn::About => Action::OpenAbout,
            Btn::CloseAbout => Action::CloseAbout,
            Btn::Recommended(i) => Action::UseRecommendedPrompt(i),
        }
    }

    fn enabled(self, ctl: &Controller) -> bool {
        let c = ctl.controls();
        match self {
            Btn::Send => c.send,
            Btn::Mode => c.mode_toggle,
            Btn::Anonymize => c.anonymize,
            Btn::RemoveFile => c.attach && !ctl.file().is_empty(),
            Btn::Recommended(_) => c.prompt,
            Btn::Sidebar | Btn::About | Btn::CloseAbout => true,
        }
    }
}

const ABOUT: &str = "gemini chat demo\n\n\
single-shot: each send is answered on its own; attach a document and tick \
'anonymize' to have personal data redacted before the answer.\n\
chat mode: a conversation with history, kept until you leave chat mode.\n\n\
usage counters are local to this session.";

// ---------------------- main ----------------------

fn main() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    App::new()
        .insert_resource(ClearColor(Color::srgb_u8(18, 18, 20)))
        .insert_resource(ChatConfig::from_env())
        .add_plugins(DefaultPlugins)
        .add_plugins(GenaiChatPlugin)
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (handle_text_input, handle_file_drop, handle_buttons)
                .before(bevy_genai_chat::ChatSet::Dispatch),
        )
        // readers run after bevy_genai_chat applied the stream for this frame
        .add_systems(
            Update,
            (refresh_view, on_error).after(bevy_genai_chat::ChatSet::Drain),
        )
        .run();
}

// ---------------------- setup ui ----------------------

fn button(p: &mut ChildSpawnerCommands, label: &str, width: f32, tag: Btn, font: &TextFont) {
    p.spawn((
        Button,
        Node {
            width: Val::Px(width),
            height: Val::Px(28.0),
            align_items: AlignItems::Center,
            justify_content: JustifyContent::Center,
            ..default()
        },
        BackgroundColor(Color::srgb(0.2, 0.2, 0.25)),
        tag,
    ))
    .with_children(|b| {
        b.spawn((Text::new(label), font.clone(), TextColor(Color::WHITE)));
    });
}

fn setup(mut commands: Commands, ctl: Res<Controller>) {
    commands.spawn(Camera2d);

    let style_18 = TextFont { font_size: 18.0, ..default() };
    let style_14 = TextFont { font_size: 14.0, ..default() };

    // root: sidebar | main column
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Row,
                column_gap: Val::Px(8.0),
                padding: UiRect::all(Val::Px(12.0)),
                ..default()
            },
            BackgroundColor(Color::NONE),
        ))
        .with_children(|root| {
            // --- sidebar: usage + recommended prompts ---
            root.spawn((
                Node {
                    width: Val::Px(260.0),
                    height: Val::Percent(100.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(8.0)),
                    ..default()
                },
                BackgroundColor(Color::srgb(0.10, 0.10, 0.12)),
                Sidebar,
            ))
            .with_children(|s| {
                s.spawn((Text::new("usage"), style_14.clone(), TextColor(Color::WHITE)));
                for w in UsageWindow::ALL {
                    s.spawn((
                        Text::new(""),
                        style_14.clone(),
                        TextColor(Color::srgb_u8(200, 200, 200)),
                        UsageText(w),
                    ));
                }
                s.spawn((Text::new("try:"), style_14.clone(), TextColor(Color::WHITE)));
                for (i, prompt) in ctl.recommended_prompts().iter().enumerate() {
                    s.spawn((
                        Button,
                        Node { width: Val::Percent(100.0), padding: UiRect::all(Val::Px(4.0)), ..default() },
                        BackgroundColor(Color::srgb(0.2, 0.2, 0.25)),
                        Btn::Recommended(i),
                    ))
                    .with_children(|b| {
                        b.spawn((Text::new(prompt.clone()), style_14.clone(), TextColor(Color::WHITE)));
                    });
                }
            });

            // --- main column ---
            root.spawn(Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(8.0),
                ..default()
            })
            .with_children(|c| {
                // toolbar
                c.spawn(Node { column_gap: Val::Px(8.0), flex_direction: FlexDirection::Row, ..default() })
                    .with_children(|row| {
                        button(row, "sidebar", 80.0, Btn::Sidebar, &style_14);
                        button(row, "chat mode", 100.0, Btn::Mode, &style_14);
                        button(row, "anonymize", 100.0, Btn::Anonymize, &style_14);
                        button(row, "about", 70.0, Btn::About, &style_14);
                        row.spawn((Text::new(""), style_14.clone(), TextColor(Color::srgb_u8(240, 200, 80)), LoaderText));
                    });

                // response area (scrolls to latest)
                c.spawn((
                    Node {
                        width: Val::Percent(100.0),
                        height: Val::Percent(100.0),
                        flex_direction: FlexDirection::Column,
                        overflow: Overflow::scroll_y(),
                        padding: UiRect::axes(Val::Px(8.0), Val::Px(12.0)),
                        ..default()
                    },
                    BackgroundColor(Color::srgb(0.08, 0.08, 0.10)),
                    ScrollPosition::default(),
                    ResponseScroll,
                ))
                .with_children(|r| {
                    r.spawn((Text::new(""), style_18.clone(), TextColor(Color::WHITE), ResponseText));
                });

                // file chip
                c.spawn(Node { column_gap: Val::Px(8.0), flex_direction: FlexDirection::Row, ..default() })
                    .with_children(|row| {
                        row.spawn((Text::new(""), style_14.clone(), TextColor(Color::srgb_u8(160, 200, 255)), FileText));
                        button(row, "x", 28.0, Btn::RemoveFile, &style_14);
                    });

                // prompt + send
                c.spawn(Node { column_gap: Val::Px(8.0), flex_direction: FlexDirection::Row, ..default() })
                    .with_children(|row| {
                        row.spawn((Text::new("> "), style_14.clone(), TextColor(Color::WHITE), PromptText));
                        button(row, "send", 70.0, Btn::Send, &style_14);
                    });
            });

            // --- about modal (hidden until opened) ---
            root.spawn((
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Percent(25.0),
                    top: Val::Percent(25.0),
                    width: Val::Percent(50.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(8.0),
                    padding: UiRect::all(Val::Px(16.0)),
                    display: Display::None,
                    ..default()
                },
                BackgroundColor(Color::srgb(0.15, 0.15, 0.18)),
                AboutModal,
            ))
            .with_children(|m| {
                m.spawn((Text::new(ABOUT), style_14.clone(), TextColor(Color::WHITE)));
                button(m, "close", 70.0, Btn::CloseAbout, &style_14);
            });
        });
}

// ---------------------- input ----------------------

fn handle_text_input(
    mut ev_kbd: EventReader<KeyboardInput>,
    keys: Res<ButtonInput<KeyCode>>,
    ctl: Res<Controller>,
    mut actions: EventWriter<ChatAction>,
) {
    if keys.just_pressed(KeyCode::Escape) && ctl.view().about_open {
        actions.write(ChatAction(Action::CloseAbout));
    }
    if !ctl.controls().prompt {
        ev_kbd.clear();
        return;
    }

    let shift = keys.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
    let mut prompt = ctl.prompt().to_string();
    let mut edited = false;
    let mut send = false;

    for ev in ev_kbd.read() {
        if !ev.state.is_pressed() {
            continue;
        }
        match &ev.logical_key {
            Key::Enter if shift => {
                prompt.push('\n');
                edited = true;
            }
            Key::Enter => send = true,
            Key::Backspace => {
                prompt.pop();
                edited = true;
            }
            _ => {
                if let Some(txt) = &ev.text {
                    let s = txt.replace('\r', "").replace('\n', "");
                    if !s.is_empty() {
                        prompt.push_str(&s);
                        edited = true;
                    }
                }
            }
        }
    }

    if edited {
        actions.write(ChatAction(Action::SetPrompt(prompt)));
    }
    if send {
        info!(target: "chat", "enter -> send");
        actions.write(ChatAction(Action::Send));
    }
}

fn handle_file_drop(mut ev_drop: EventReader<FileDragAndDrop>, mut actions: EventWriter<ChatAction>) {
    for ev in ev_drop.read() {
        if let FileDragAndDrop::DroppedFile { path_buf, .. } = ev {
            info!(target: "chat", "file dropped: {}", path_buf.display());
            actions.write(ChatAction(Action::AttachFile(FileSource::path(path_buf.clone()))));
        }
    }
}

fn handle_buttons(
    mut q: Query<(&Interaction, &Btn, &mut BackgroundColor), Changed<Interaction>>,
    ctl: Res<Controller>,
    mut actions: EventWriter<ChatAction>,
) {
    for (i, btn, mut bg) in &mut q {
        if !btn.enabled(&ctl) {
            continue;
        }
        match *i {
            Interaction::Pressed => {
                bg.0 = Color::srgb(0.3, 0.3, 0.35);
                actions.write(ChatAction(btn.action(&ctl)));
            }
            Interaction::Hovered => bg.0 = Color::srgb(0.25, 0.25, 0.3),
            Interaction::None => bg.0 = Color::srgb(0.2, 0.2, 0.25),
        }
    }
}

// ---------------------- view refresh ----------------------

fn refresh_view(
    ctl: Res<Controller>,
    mut last_scroll: Local<u64>,
    mut texts: ParamSet<(
        Query<&mut Text, With<ResponseText>>,
        Query<&mut Text, With<PromptText>>,
        Query<&mut Text, With<FileText>>,
        Query<&mut Text, With<LoaderText>>,
        Query<(&mut Text, &UsageText)>,
    )>,
    mut q_scroll: Query<&mut ScrollPosition, With<ResponseScroll>>,
    mut q_nodes: ParamSet<(Query<&mut Node, With<Sidebar>>, Query<&mut Node, With<AboutModal>>)>,
    mut q_btn: Query<(&Btn, &mut BackgroundColor)>,
) {
    if !ctl.is_changed() {
        return;
    }

    if let Ok(mut t) = texts.p0().single_mut() {
        t.0 = match ctl.mode() {
            RequestMode::SingleShot => ctl.renderer().surface().to_string(),
            RequestMode::Conversational => ctl
                .renderer()
                .transcript()
                .iter()
                .map(|e| match e.role {
                    Role::User => format!("you: {}\n", e.text),
                    Role::Model => format!("gemini: {}\n", e.text),
                })
                .collect(),
        };
    }
    if let Ok(mut t) = texts.p1().single_mut() {
        let caret = if ctl.controls().prompt { " |" } else { "" };
        t.0 = format!("> {}{}", ctl.prompt(), caret);
    }
    if let Ok(mut t) = texts.p2().single_mut() {
        t.0 = ctl.file().name().map(|n| format!("attached: {n}")).unwrap_or_default();
    }
    if let Ok(mut t) = texts.p3().single_mut() {
        let mode = match ctl.mode() {
            RequestMode::SingleShot if ctl.anonymize() => "single-shot [anonymize]",
            RequestMode::SingleShot => "single-shot",
            RequestMode::Conversational => "chat",
        };
        let busy = if ctl.controls().loader_visible { " (thinking...)" } else { "" };
        t.0 = format!("{mode}{busy}");
    }
    let usage = ctl.usage().render_all();
    for (mut t, UsageText(w)) in texts.p4().iter_mut() {
        if let Some(u) = usage.iter().find(|u| u.window == *w) {
            t.0 = format!("{}: {} ({:.0}%)", w.label(), u.consumed_text, u.percentage.min(100.0));
        }
    }

    let generation = ctl.renderer().scroll_generation();
    if *last_scroll != generation {
        *last_scroll = generation;
        for mut pos in &mut q_scroll {
            pos.offset_y = f32::MAX;
        }
    }

    let view = ctl.view();
    for mut node in &mut q_nodes.p0() {
        node.display = if view.sidebar_collapsed { Display::None } else { Display::Flex };
    }
    for mut node in &mut q_nodes.p1() {
        node.display = if view.about_open { Display::Flex } else { Display::None };
    }

    // dim whatever is disabled while a request is in flight
    for (btn, mut bg) in &mut q_btn {
        bg.0 = if btn.enabled(&ctl) {
            Color::srgb(0.2, 0.2, 0.25)
        } else {
            Color::srgb(0.12, 0.12, 0.14)
        };
    }
}

fn on_error(mut ev: EventReader<ChatErrorEvt>) {
    for ChatErrorEvt { error } in ev.read() {
        error!(target: "chat", "chat error: {}", error);
    }
}
