use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};
use std::{io, time::Duration};
use textwrap::wrap;
use tui_input::{backend::crossterm::EventHandler, Input};

use lounge_chat::{
    session::{ContactPreview, SessionView},
    Attachment, Contact, ContactId, MediaKind, Message, Presence,
};

// Export types needed by main module
pub use ratatui::backend::CrosstermBackend;
pub use ratatui::Terminal;

/// What the user asked for, for the main loop to apply to the session
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    SelectContact(ContactId),
    DraftChanged(String),
    Send,
    /// Stage an image; `text` is whatever was typed before the command
    AttachImage { source: String, text: String },
    ToggleRecording,
    CancelAttachment,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

struct Toast {
    text: String,
    kind: ToastKind,
    timestamp: chrono::DateTime<chrono::Utc>,
}

enum Tab {
    Messages,
    Contacts,
}

pub struct ChatUI {
    input: Input,
    active_tab: Tab,
    current_contact_index: usize,
    contact_ids: Vec<ContactId>,
    toast: Option<Toast>,
}

impl Default for ChatUI {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatUI {
    pub fn new() -> Self {
        ChatUI {
            input: Input::default(),
            active_tab: Tab::Messages,
            current_contact_index: 0,
            contact_ids: Vec::new(),
            toast: None,
        }
    }

    /// Keep the contact cursor in line with the session's contact list
    pub fn sync(&mut self, view: &SessionView) {
        self.contact_ids = view.contacts.iter().map(|p| p.contact.id.clone()).collect();
        if let Some(idx) = view.contacts.iter().position(|p| p.active) {
            self.current_contact_index = idx;
        }
    }

    pub fn clear_input(&mut self) {
        self.input = Input::default();
    }

    pub fn show_toast(&mut self, text: &str, kind: ToastKind) {
        debug!("UI: toast {:?}: {}", kind, text);
        self.toast = Some(Toast {
            text: text.to_string(),
            kind,
            timestamp: chrono::Utc::now(),
        });
    }

    // Drop the toast once it has been on screen long enough
    pub fn clean_toasts(&mut self, timeout_secs: i64) {
        if let Some(toast) = &self.toast {
            if (chrono::Utc::now() - toast.timestamp).num_seconds() >= timeout_secs {
                self.toast = None;
            }
        }
    }

    fn move_contact_cursor(&mut self, forward: bool) -> Option<UiCommand> {
        if self.contact_ids.is_empty() {
            return None;
        }
        let len = self.contact_ids.len();
        self.current_contact_index = if forward {
            (self.current_contact_index + 1) % len
        } else {
            (self.current_contact_index + len - 1) % len
        };
        Some(UiCommand::SelectContact(
            self.contact_ids[self.current_contact_index].clone(),
        ))
    }

    fn submit(&mut self) -> Option<UiCommand> {
        let value = self.input.value().to_string();
        if let Some(idx) = value.find("/attach ") {
            let (text, command) = value.split_at(idx);
            let source = command["/attach ".len()..].trim().to_string();
            let text = text.trim_end().to_string();
            self.input = Input::new(text.clone());
            return Some(UiCommand::AttachImage { source, text });
        }
        Some(UiCommand::Send)
    }

    pub fn handle_input(&mut self) -> Result<Option<UiCommand>> {
        if !event::poll(Duration::from_millis(50))? {
            return Ok(None);
        }

        let key = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => key,
            _ => return Ok(None),
        };

        let command = match key.code {
            KeyCode::Esc => Some(UiCommand::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(UiCommand::Quit)
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(UiCommand::ToggleRecording)
            }
            KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(UiCommand::CancelAttachment)
            }
            KeyCode::Tab => {
                self.active_tab = match self.active_tab {
                    Tab::Messages => Tab::Contacts,
                    Tab::Contacts => Tab::Messages,
                };
                None
            }
            KeyCode::Up if matches!(self.active_tab, Tab::Contacts) => {
                self.move_contact_cursor(false)
            }
            KeyCode::Down if matches!(self.active_tab, Tab::Contacts) => {
                self.move_contact_cursor(true)
            }
            KeyCode::Enter => match self.active_tab {
                Tab::Messages => self.submit(),
                Tab::Contacts => {
                    self.active_tab = Tab::Messages;
                    None
                }
            },
            _ => {
                if let Tab::Messages = self.active_tab {
                    self.input.handle_event(&Event::Key(key));
                    Some(UiCommand::DraftChanged(self.input.value().to_string()))
                } else {
                    None
                }
            }
        };

        Ok(command)
    }

    pub fn draw<B: Backend>(&self, frame: &mut Frame<B>, view: &SessionView) {
        let size = frame.size();

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25), // Conversations
                Constraint::Percentage(75), // Chat
            ])
            .split(size);

        let chat_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // Messages
                Constraint::Length(3), // Draft
                Constraint::Length(1), // Help line
            ])
            .split(chunks[1]);

        let contacts: Vec<ListItem> = view
            .contacts
            .iter()
            .enumerate()
            .map(|(i, preview)| contact_item(preview, i == self.current_contact_index))
            .collect();

        let contacts_list = List::new(contacts).block(
            Block::default()
                .title(format!("{} · Chats", view.user.name))
                .borders(Borders::ALL)
                .border_style(match self.active_tab {
                    Tab::Contacts => Style::default().fg(Color::Yellow),
                    _ => Style::default(),
                }),
        );
        frame.render_widget(contacts_list, chunks[0]);

        draw_messages(frame, view, chat_chunks[0]);

        let input_block = Block::default()
            .title(draft_title(view))
            .borders(Borders::ALL)
            .border_style(match (&view.recording, &self.active_tab) {
                (Some(_), _) => Style::default().fg(Color::Red),
                (None, Tab::Messages) => Style::default().fg(Color::Yellow),
                _ => Style::default(),
            });

        let input_widget = Paragraph::new(self.input.value()).block(input_block);
        frame.render_widget(input_widget, chat_chunks[1]);

        let help = Paragraph::new(Line::from(vec![Span::styled(
            "ESC quit | TAB switch | Enter send | Ctrl+R record | Ctrl+X discard media \
             | [text] /attach <path|url>",
            Style::default().fg(Color::Gray),
        )]));
        frame.render_widget(help, chat_chunks[2]);

        if let Tab::Messages = self.active_tab {
            frame.set_cursor(
                chat_chunks[1].x + self.input.cursor() as u16 + 1,
                chat_chunks[1].y + 1,
            );
        }

        if let Some(toast) = &self.toast {
            draw_toast(frame, toast, size);
        }
    }
}

fn contact_item(preview: &ContactPreview, selected: bool) -> ListItem<'static> {
    let presence = match preview.contact.presence {
        Presence::Online => Span::styled("● ", Style::default().fg(Color::Green)),
        Presence::Offline => Span::styled("○ ", Style::default().fg(Color::DarkGray)),
    };
    let cursor = if selected { "> " } else { "  " };
    let unread = if preview.unread > 0 {
        format!(" ({})", preview.unread)
    } else {
        String::new()
    };
    let name_style = if preview.unread > 0 {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut lines = vec![Line::from(vec![
        Span::raw(cursor),
        presence,
        avatar_badge(&preview.contact),
        Span::styled(format!("{}{}", preview.contact.name, unread), name_style),
    ])];
    if let Some(last) = &preview.last_message {
        let time = preview
            .last_activity
            .map(|t| t.format("%H:%M ").to_string())
            .unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("    {}{}", time, last),
            Style::default().fg(Color::Gray),
        )));
    }
    ListItem::new(lines)
}

// Pictures cannot be drawn here, so every contact gets its initial. Contacts
// with an avatar are told apart by color.
fn avatar_badge(contact: &Contact) -> Span<'static> {
    let style = match contact.avatar {
        Some(_) => Style::default().fg(Color::Black).bg(Color::Cyan),
        None => Style::default().fg(Color::White).bg(Color::DarkGray),
    };
    Span::styled(format!(" {} ", contact.initial()), style)
}

fn draft_title(view: &SessionView) -> String {
    if let Some(recording) = &view.recording {
        return format!("Recording ● {}", recording.elapsed);
    }
    match &view.draft.staged {
        Some(attachment) => format!("Message [{}]", attachment_label(attachment)),
        None => "Message".to_string(),
    }
}

fn attachment_label(attachment: &Attachment) -> String {
    match attachment.kind {
        MediaKind::Audio => format!(
            "▶ {}",
            attachment.duration_label().unwrap_or_else(|| "0:00".to_string())
        ),
        MediaKind::Image => format!("image {}", attachment.content),
    }
}

fn message_text(message: &Message) -> String {
    match (&message.attachment, message.body.trim().is_empty()) {
        (Some(attachment), true) => attachment_label(attachment),
        (Some(attachment), false) => {
            format!("{} [{}]", message.body, attachment_label(attachment))
        }
        (None, _) => message.body.clone(),
    }
}

fn draw_messages<B: Backend>(f: &mut Frame<B>, view: &SessionView, area: Rect) {
    let wrap_width = area.width.saturating_sub(2).max(1) as usize;
    let contact_name = view
        .active_contact
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_default();

    let items: Vec<ListItem> = view
        .messages
        .iter()
        .flat_map(|m| {
            let mine = m.sender_id == view.user.id;
            let time = m.created_at.format("%H:%M");
            let prefix = if mine {
                format!("[{}] You: ", time)
            } else {
                format!("[{}] {}: ", time, contact_name)
            };
            let receipt = match (mine, m.read) {
                (true, true) => " ✓✓",
                (true, false) => " ✓",
                _ => "",
            };
            let full_content = format!("{}{}{}", prefix, message_text(m), receipt);

            let wrapped_lines: Vec<String> = wrap(&full_content, wrap_width)
                .into_iter()
                .map(|l| l.into_owned())
                .collect();

            let style = if mine {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };

            wrapped_lines
                .into_iter()
                .map(move |line| ListItem::new(Text::from(line)).style(style))
        })
        .collect();

    let title = match &view.active_contact {
        Some(contact) => format!("{} ({})", contact.name, contact.presence),
        None => "No conversation selected".to_string(),
    };

    // Select the last line so the list scrolls to the bottom
    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(items.len() - 1));
    }

    let messages_list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default());

    f.render_stateful_widget(messages_list, area, &mut list_state);
}

fn draw_toast<B: Backend>(f: &mut Frame<B>, toast: &Toast, area: Rect) {
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 3.min(area.height.saturating_sub(2));
    let popup_x = area.width.saturating_sub(popup_width + 2);
    let popup_area = Rect::new(popup_x, 1, popup_width, popup_height);

    let color = match toast.kind {
        ToastKind::Info => Color::Cyan,
        ToastKind::Success => Color::Green,
        ToastKind::Error => Color::Red,
    };

    let popup = Paragraph::new(toast.text.as_str())
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );

    f.render_widget(Clear, popup_area);
    f.render_widget(popup, popup_area);
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lounge_chat::{ContentRef, MessageId};

    fn message(body: &str, attachment: Option<Attachment>) -> Message {
        Message {
            id: MessageId(1),
            sender_id: "me".to_string(),
            receiver_id: "1".to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            read: false,
            attachment,
        }
    }

    #[test]
    fn test_message_text() {
        let voice = Attachment::audio(ContentRef::new("capture://audio/x"), 34);
        assert_eq!(message_text(&message("", Some(voice.clone()))), "▶ 0:34");
        assert_eq!(message_text(&message("listen", Some(voice))), "listen [▶ 0:34]");
        assert_eq!(message_text(&message("Yay!", None)), "Yay!");
    }

    #[test]
    fn test_toast_expires() {
        let mut ui = ChatUI::new();
        ui.show_toast("Message sent", ToastKind::Success);
        ui.clean_toasts(60);
        assert!(ui.toast.is_some());
        ui.clean_toasts(0);
        assert!(ui.toast.is_none());
    }

    #[test]
    fn test_attach_command_parsing() {
        let mut ui = ChatUI::new();
        for c in "/attach  /tmp/river.png ".chars() {
            ui.input.handle(tui_input::InputRequest::InsertChar(c));
        }
        assert_eq!(
            ui.submit(),
            Some(UiCommand::AttachImage {
                source: "/tmp/river.png".to_string(),
                text: String::new(),
            })
        );
        assert_eq!(ui.input.value(), "");

        for c in "nice hand".chars() {
            ui.input.handle(tui_input::InputRequest::InsertChar(c));
        }
        assert_eq!(ui.submit(), Some(UiCommand::Send));
    }

    #[test]
    fn test_attach_keeps_typed_text() {
        let mut ui = ChatUI::default();
        for c in "look at this flop /attach https://cdn.example/flop.png".chars() {
            ui.input.handle(tui_input::InputRequest::InsertChar(c));
        }
        assert_eq!(
            ui.submit(),
            Some(UiCommand::AttachImage {
                source: "https://cdn.example/flop.png".to_string(),
                text: "look at this flop".to_string(),
            })
        );
        assert_eq!(ui.input.value(), "look at this flop");
    }

    #[test]
    fn test_avatar_badge_uses_initial() {
        let mut contact = Contact::new("2", "river rat", Presence::Online);
        assert_eq!(avatar_badge(&contact).content, " R ");
        contact.avatar = Some("https://cdn.example/rr.png".to_string());
        assert_eq!(avatar_badge(&contact).style.bg, Some(Color::Cyan));
    }
}
