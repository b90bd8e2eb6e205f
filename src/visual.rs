//src/visual.rs
// Interface visual no terminal: tabuleiro, feedback do puzzle e barra de progresso

// Bibliotecas externas
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use shakmaty::{Color, File, Position, Rank, Square};

// Módulos internos
use crate::{
    ceval::NodeEvals,
    ground::{BoardConfig, Ground},
    puzzle::RoundResult,
    trans::Trans,
    tree,
    vm::{Feedback, Mode, Vm},
};

// Mensagens coloridas
pub fn console_yellow(message: &str) {
    println!("{}", message.yellow());
}

pub fn print_error(message: &str) {
    println!("{}", message.red().bold());
}

pub fn print_success(message: &str) {
    println!("{}", message.green().bold());
}

// Imprime o cabeçalho principal
pub fn print_main_header() {
    println!("\n{}", "♟️  Puzzles de Xadrez".blue().bold());
    println!("{}", "═".repeat(50).cyan());
}

pub fn print_engine_info(engine_path: &str) {
    println!("{} {}", "Usando motor em:".blue().bold(), engine_path);
}

pub fn print_help() {
    println!("{}", "Comandos:".cyan().bold());
    println!("  e2e4 / e7e8q      joga um lance em uci");
    println!("  =q =n =r =b       escolhe a peça da promoção pendente");
    println!("  left right up down home end   navega pela árvore");
    println!("  l / x / space     ceval, modo ameaça, melhor lance");
    println!("  solution          mostra a solução");
    println!("  vote+ / vote-     vota no puzzle");
    println!("  next              próximo puzzle do lote");
    println!("  help / quit");
}

/// Texto traduzido, ou `default` quando a chave não tem tradução
fn t(trans: &Trans, key: &str, default: &str) -> String {
    let s = trans.noarg(key);
    if s == key { default.to_string() } else { s }
}

/// Desenha o tabuleiro da configuração atual, do ponto de vista da orientação
pub fn render_board(config: &BoardConfig) -> String {
    let Ok(pos) = tree::parse_position(&config.fen) else { return config.fen.clone() };
    let board = pos.board();
    let last: Vec<&str> = config.last_move.iter().flatten().map(String::as_str).collect();
    let white = config.orientation == Color::White;
    let ranks: Vec<u32> = if white { (0..8).rev().collect() } else { (0..8).collect() };
    let files: Vec<u32> = if white { (0..8).collect() } else { (0..8).rev().collect() };

    let mut out = String::new();
    for &r in &ranks {
        if config.coordinates {
            out.push_str(&format!("{} ", r + 1));
        }
        for &f in &files {
            let sq = Square::from_coords(File::new(f), Rank::new(r));
            let cell = match board.piece_at(sq) {
                Some(p) => format!(" {} ", p.char()),
                None => "   ".to_string(),
            };
            let cell = cell.as_str().black();
            let cell = if config.highlight.last_move && last.contains(&sq.to_string().as_str()) {
                cell.on_yellow()
            } else if (f + r) % 2 == 1 {
                cell.on_white()
            } else {
                cell.on_bright_black()
            };
            out.push_str(&cell.to_string());
        }
        out.push('\n');
    }
    if config.coordinates {
        out.push_str("  ");
        for &f in &files {
            out.push_str(&format!(" {} ", (b'a' + f as u8) as char));
        }
        out.push('\n');
    }
    out
}

/// Linha de feedback do puzzle
pub fn feedback_line(vm: &Vm, color: Color, trans: &Trans) -> String {
    if vm.loading {
        return t(trans, "loading", "Carregando...").dimmed().to_string();
    }
    match vm.last_feedback {
        Feedback::Win => t(trans, "puzzleSuccess", "Sucesso!").green().bold().to_string(),
        Feedback::Good => t(trans, "bestMove", "Melhor lance! Continue...").green().to_string(),
        Feedback::Fail | Feedback::Retry => {
            t(trans, "notTheMove", "Não é esse o lance! Tente outro.").red().to_string()
        }
        Feedback::Init if vm.mode == Mode::View => {
            t(trans, "puzzleComplete", "Puzzle concluído!").cyan().to_string()
        }
        Feedback::Init => {
            let key = format!("findTheBestMoveFor{}", if color == Color::White { "White" } else { "Black" });
            t(trans, &key, &format!("Encontre o melhor lance para as {}", if color == Color::White { "brancas" } else { "pretas" }))
                .yellow()
                .to_string()
        }
    }
}

pub fn round_line(round: &RoundResult) -> String {
    let outcome = if round.win { "vitória".green() } else { "derrota".red() };
    format!("Resultado: {} ({:+})", outcome, round.rating_diff)
}

/// Avaliação local e do servidor do nó atual, quando houver
pub fn eval_line(evals: &NodeEvals) -> Option<String> {
    let client = evals.client.as_ref().map(|c| {
        let score = match (c.mate, c.cp) {
            (Some(m), _) => format!("#{m}"),
            (None, Some(cp)) => format!("{:+.2}", cp as f64 / 100.0),
            _ => "?".to_string(),
        };
        format!("{} {} (prof. {}) {}", "ceval".cyan(), score, c.depth, c.best().unwrap_or("-"))
    });
    let server = evals.server.as_ref().map(|s| match (s.mate, s.cp) {
        (Some(m), _) => format!("{} #{m}", "servidor".cyan()),
        (None, Some(cp)) => format!("{} {:+.2}", "servidor".cyan(), cp as f64 / 100.0),
        _ => format!("{} ?", "servidor".cyan()),
    });
    match (client, server) {
        (None, None) => None,
        (a, b) => Some([a, b].into_iter().flatten().collect::<Vec<_>>().join("  ")),
    }
}

/// Tabuleiro "de terminal": guarda a última configuração e a seleção
#[derive(Debug, Default)]
pub struct TerminalGround {
    pub config:   Option<BoardConfig>,
    pub selected: Option<Square>,
}

impl Ground for TerminalGround {
    fn set(&mut self, config: &BoardConfig) {
        debug!("tabuleiro: {}", config.fen);
        self.config = Some(config.clone());
    }

    fn select_square(&mut self, sq: Option<Square>) {
        self.selected = sq;
    }

    fn cancel_premove(&mut self) {
        if let Some(c) = self.config.as_mut() {
            c.premovable = false;
        }
    }
}

// Barra de progresso da verificação de lotes
pub struct CustomProgressBar {
    progress_bar: ProgressBar,
}

impl CustomProgressBar {
    pub fn new(total: u64) -> Self {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.blue} {msg} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        CustomProgressBar { progress_bar: pb }
    }

    pub fn inc(&self, delta: u64) {
        self.progress_bar.inc(delta);
    }

    pub fn set_message(&self, msg: &str) {
        self.progress_bar.set_message(msg.to_string());
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.progress_bar.finish_with_message(msg.to_string());
    }

    pub fn log(&self, msg: &str) {
        self.progress_bar.println(msg);
    }
}

/// Resumo da verificação de um lote
pub fn render_check_summary(total: usize, failures: &[(u32, String)]) {
    println!("{}", "Verificação do lote:".cyan().bold());
    println!("- Puzzles verificados: {}", total);
    println!("- Válidos: {}", (total - failures.len()).to_string().green());
    if failures.is_empty() {
        print_success("Nenhum problema encontrado");
        return;
    }
    println!("- Com problemas: {}", failures.len().to_string().red());
    for (id, reason) in failures {
        println!("  - {}: {}", id.to_string().yellow(), reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ground::{make_cg_config, CgContext},
        prefs::PuzzlePrefs,
        tree::{child_node, root_node},
    };

    fn config(orientation: Color) -> BoardConfig {
        let root = root_node(None).unwrap();
        let e4 = child_node(&root, "e2e4").unwrap();
        let prefs = PuzzlePrefs::default();
        make_cg_config(&CgContext { node: &e4, puzzle_color: orientation, mode: Mode::Play, initial_ply: 1, prefs: &prefs })
    }

    #[test]
    fn board_has_eight_ranks_in_orientation_order() {
        colored::control::set_override(false);
        let white = render_board(&config(Color::White));
        let lines: Vec<&str> = white.lines().collect();
        assert!(lines[0].starts_with("8 "));
        assert!(lines[0].contains(" r "));
        assert!(lines[4].contains(" P "));
        assert!(lines[8].trim_start().starts_with("a"));

        let black = render_board(&config(Color::Black));
        assert!(black.lines().next().unwrap().starts_with("1 "));
    }

    #[test]
    fn untranslated_feedback_uses_defaults() {
        colored::control::set_override(false);
        let nodes = vec![root_node(None).unwrap()];
        let mut vm = Vm::new(String::new(), nodes.clone(), nodes);
        let trans = Trans::default();
        assert!(feedback_line(&vm, Color::White, &trans).contains("brancas"));
        vm.last_feedback = Feedback::Retry;
        assert!(feedback_line(&vm, Color::White, &trans).starts_with("Não é esse"));
    }
}
