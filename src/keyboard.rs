// src/keyboard.rs
// Atalhos de teclado: navegação na árvore, ceval, ameaça e melhor lance

use anyhow::Result;
use log::trace;

use crate::{ctrl::KeyboardController, tree::path};

/// Teclas reconhecidas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Space,
    Char(char),
}

impl Key {
    /// Nome da tecla como digitado no terminal ("left", "l", "space"...)
    pub fn parse(s: &str) -> Option<Key> {
        let key = match s {
            "left" | "←"  => Key::Left,
            "right" | "→" => Key::Right,
            "up" | "↑"    => Key::Up,
            "down" | "↓"  => Key::Down,
            "home"        => Key::Home,
            "end"         => Key::End,
            "space" | " " => Key::Space,
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

pub fn prev<C: KeyboardController + ?Sized>(ctrl: &mut C) {
    let to = path::init(&ctrl.vm().path);
    ctrl.user_jump(&to);
}

pub fn next<C: KeyboardController + ?Sized>(ctrl: &mut C) {
    let vm = ctrl.vm();
    let Some(child) = vm.node.children.first() else { return };
    let to = format!("{}{}", vm.path, child.id);
    ctrl.user_jump(&to);
}

pub fn first<C: KeyboardController + ?Sized>(ctrl: &mut C) {
    ctrl.user_jump(&path::root());
}

pub fn last<C: KeyboardController + ?Sized>(ctrl: &mut C) {
    let to: String = ctrl.vm().mainline.iter().skip(1).map(|n| n.id.as_str()).collect();
    ctrl.user_jump(&to);
}

/// Aplica a tecla; devolve false quando ela não tem atalho
pub fn handle<C: KeyboardController + ?Sized>(ctrl: &mut C, key: Key) -> Result<bool> {
    trace!("tecla {key:?}");
    match key {
        Key::Left => prev(ctrl),
        Key::Right => next(ctrl),
        Key::Up | Key::Home => first(ctrl),
        Key::Down | Key::End => last(ctrl),
        Key::Char('l') => ctrl.toggle_ceval(),
        Key::Char('x') => ctrl.toggle_threat_mode(),
        Key::Space => {
            if ctrl.get_ceval().enabled() {
                ctrl.play_best_move()?;
            } else {
                ctrl.toggle_ceval();
            }
        }
        Key::Char(_) => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ctrl::{PuzzleCtrl, PuzzleOpts},
        prefs::PuzzlePrefs,
        puzzle::{tests::SAMPLE, PuzzleData},
        server::BatchServer,
    };
    use std::collections::HashMap;

    fn ctrl() -> PuzzleCtrl<BatchServer> {
        let data: PuzzleData = serde_json::from_str(SAMPLE).unwrap();
        let opts = PuzzleOpts { pref: PuzzlePrefs::default(), data, i18n: HashMap::new() };
        PuzzleCtrl::new(opts, BatchServer::default(), Box::new(|| {})).unwrap()
    }

    #[test]
    fn parses_key_names() {
        assert_eq!(Key::parse("left"), Some(Key::Left));
        assert_eq!(Key::parse("space"), Some(Key::Space));
        assert_eq!(Key::parse("x"), Some(Key::Char('x')));
        assert_eq!(Key::parse("xx"), None);
    }

    #[test]
    fn navigates_the_mainline() {
        let mut c = ctrl();
        assert_eq!(c.vm().path, "08WG1A");

        handle(&mut c, Key::Left).unwrap();
        assert_eq!(c.vm().path, "08WG");
        handle(&mut c, Key::Right).unwrap();
        assert_eq!(c.vm().path, "08WG1A");
        // sem filhos: permanece
        handle(&mut c, Key::Right).unwrap();
        assert_eq!(c.vm().path, "08WG1A");

        handle(&mut c, Key::Home).unwrap();
        assert_eq!(c.vm().path, "");
        assert_eq!(c.vm().node.ply, 0);
        handle(&mut c, Key::End).unwrap();
        assert_eq!(c.vm().path, "08WG1A");
    }

    #[test]
    fn toggles_ceval_and_threat() {
        let mut c = ctrl();
        assert!(!c.get_ceval().enabled());
        assert!(handle(&mut c, Key::Char('l')).unwrap());
        assert!(c.get_ceval().enabled());
        handle(&mut c, Key::Char('x')).unwrap();
        assert!(crate::ctrl::Controller::threat_mode(&c));
        handle(&mut c, Key::Char('l')).unwrap();
        assert!(!c.get_ceval().enabled());
        assert!(!crate::ctrl::Controller::threat_mode(&c));
        assert!(!handle(&mut c, Key::Char('q')).unwrap());
    }
}
