// src/main.rs
// ---------------------------------------------------------------------------
// CLI: resolver puzzles de um lote no terminal, verificar lotes e importar PGN.
// ---------------------------------------------------------------------------

use std::{cell::Cell, collections::HashMap, fs, io::Write, path::PathBuf, rc::Rc, time::Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use shakmaty::{uci::UciMove, Role};
use tokio::io::{AsyncBufReadExt, BufReader};

use chess_puzzle_ctrl::{
    config,
    ctrl::{Controller, GameOver, KeyboardController, PuzzleCtrl, PuzzleOpts},
    engine::Engine,
    keyboard::{self, Key},
    lines::Lines,
    prefs::PuzzlePrefs,
    puzzle::{GameData, Puzzle, PuzzleData},
    server::{BatchServer, PuzzleServer},
    trans::Trans,
    tree::{self, TreeWrapper},
    visual,
};

/// Argumentos da linha de comando
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[arg(long, global = true, default_value = "info")]
    log_level: String,                                        // Nível de logging
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sessão interativa sobre um lote de puzzles
    Play(PlayArgs),
    /// Verifica a conformidade de um lote
    Check { batch: PathBuf },
    /// Gera um PuzzleData a partir de uma partida PGN
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct PlayArgs {
    batch: PathBuf,                                           // Lote JSON (um puzzle ou lista)
    #[arg(long)]
    prefs: Option<PathBuf>,                                   // Preferências JSON
    #[arg(long)]
    i18n: Option<PathBuf>,                                    // Traduções JSON
    #[arg(short, long)]
    engine: Option<String>,                                   // Motor UCI para o ceval
    #[arg(long)]
    syzygy: Vec<PathBuf>,                                     // Diretórios de tablebase
}

#[derive(Args, Debug)]
struct ImportArgs {
    pgn: PathBuf,
    #[arg(long)]
    id: u32,
    #[arg(long)]
    lines: String,                                            // Linhas em JSON
}

/// Configura o logger com o nível especificado
fn setup_logger(level: &str) {
    env_logger::Builder::new()
        .filter_level(level.parse().unwrap_or(log::LevelFilter::Info))
        .format(|buf, record| {
            writeln!(buf, "{} [{}] {}", chrono::Local::now().format("%H:%M:%S"), record.level(), record.args())
        })
        .init();
}

enum Flow { Continue, NewPuzzle, Quit }

/// Executa um comando digitado pelo usuário
fn exec<S: PuzzleServer>(ctrl: &mut PuzzleCtrl<S>, cmd: &str) -> Result<Flow> {
    match cmd {
        "" => {}
        "quit" | "exit" => return Ok(Flow::Quit),
        "help" | "?" => visual::print_help(),
        "solution" => {
            if !ctrl.vm().can_view_solution {
                visual::console_yellow("Solução ainda indisponível");
            }
            ctrl.view_solution()?;
        }
        "vote+" => ctrl.vote(true)?,
        "vote-" => ctrl.vote(false)?,
        "next" => {
            ctrl.next_puzzle()?;
            return Ok(Flow::NewPuzzle);
        }
        _ => {
            if let Some(piece) = cmd.strip_prefix('=') {
                let role = piece.chars().next().and_then(Role::from_char).context("peça de promoção inválida")?;
                ctrl.promote(role)?;
            } else if let Ok(UciMove::Normal { from, to, promotion }) = cmd.parse::<UciMove>() {
                match promotion {
                    Some(_) => ctrl.play_uci(cmd)?,
                    None => ctrl.user_move(from, to)?,
                }
                if let Some(view) = ctrl.promotion().view() {
                    let names: Vec<String> = view.roles.iter().map(|r| format!("={}", r.char())).collect();
                    visual::console_yellow(&format!("Promoção em {}: {}", view.dest, names.join(" ")));
                }
            } else if let Some(key) = Key::parse(cmd) {
                if !keyboard::handle(ctrl, key)? {
                    visual::print_error(&format!("comando desconhecido: {cmd}"));
                }
            } else {
                visual::print_error(&format!("comando desconhecido: {cmd}"));
            }
        }
    }
    Ok(Flow::Continue)
}

/// Mostra tabuleiro, feedback e estado do puzzle
fn render<C: Controller>(ctrl: &C) {
    let vm = ctrl.vm();
    println!();
    print!("{}", visual::render_board(&vm.cg_config));
    println!("{}", visual::feedback_line(vm, ctrl.get_orientation(), ctrl.trans()));
    if let Some(round) = &vm.round {
        println!("{}", visual::round_line(round));
    }
    match ctrl.game_over(None) {
        Some(GameOver::Checkmate) => println!("Xeque-mate"),
        Some(GameOver::Draw) => println!("Empate"),
        None => {}
    }
    if ctrl.show_computer() && ctrl.show_eval_gauge() {
        if let Some(line) = visual::eval_line(&ctrl.current_evals()) {
            println!("{line}");
        }
    }
    if ctrl.threat_mode() {
        visual::console_yellow("Modo ameaça");
    }
    if ctrl.call_to_vote() {
        visual::console_yellow("Gostou deste puzzle? vote+ / vote-");
    } else if ctrl.thanks() {
        visual::print_success("Obrigado pelo voto!");
    }
}

async fn play(args: PlayArgs) -> Result<()> {
    visual::print_main_header();
    let mut server = BatchServer::load(&args.batch)?;
    let data = server.next_puzzle()?;
    let pref = PuzzlePrefs::load_or_default(args.prefs.as_deref())?;
    let i18n = match &args.i18n {
        Some(p) => Trans::load(p)?.into_inner(),
        None => HashMap::new(),
    };

    let dirty = Rc::new(Cell::new(true));
    let flag = Rc::clone(&dirty);
    let mut ctrl = PuzzleCtrl::new(PuzzleOpts { pref, data, i18n }, server, Box::new(move || flag.set(true)))?;
    ctrl.set_ground(Box::new(visual::TerminalGround::default()));

    let mut engine = match &args.engine {
        Some(path) => {
            visual::print_engine_info(path);
            Some(Engine::new_with_syzygy(path, &args.syzygy).await?)
        }
        None => None,
    };

    visual::print_help();
    render(&ctrl);
    dirty.set(false);

    let mut started = Instant::now();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = input.next_line().await? else { break };
        if started.elapsed().as_secs() >= config::VIEW_SOLUTION_DELAY_SECS {
            ctrl.enable_view_solution();
        }

        match exec(&mut ctrl, line.trim()) {
            Ok(Flow::Quit) => break,
            Ok(Flow::NewPuzzle) => {
                started = Instant::now();
                if let Some(e) = engine.as_mut() {
                    e.new_game().await?;
                }
            }
            Ok(Flow::Continue) => {}
            Err(e) => visual::print_error(&format!("{e:#}")),
        }

        // análise pendente
        match engine.as_mut() {
            Some(e) => {
                if let Err(err) = ctrl.run_ceval(e).await {
                    warn!("ceval falhou: {err:#}");
                }
            }
            None => {
                if ctrl.ceval_mut().take_pending().is_some() {
                    warn!("ceval ligado sem --engine; análise ignorada");
                }
            }
        }

        if dirty.replace(false) {
            render(&ctrl);
        }
    }
    info!("sessão encerrada em {}", ctrl.recent_hash());
    Ok(())
}

/// Verifica um puzzle: formato, legalidade e solução reproduzível
fn check_one(data: &PuzzleData) -> Result<()> {
    data.check()?;
    let (wins, _) = data.puzzle.lines.leaves();
    if wins == 0 {
        bail!("linhas sem nenhuma vitória");
    }
    let mut tree = TreeWrapper::from_parts(&data.game.tree_parts)?;
    let initial = tree.mainline_path();
    if let Some(branch) = &data.puzzle.branch {
        tree.merge_solution(&initial, branch).context("ramo da solução")?;
    }
    tree.add_ucis(&data.puzzle.lines.solution(), &initial)?;
    Ok(())
}

fn check(batch: PathBuf) -> Result<()> {
    let mut server = BatchServer::load(&batch)?;
    let total = server.remaining();
    let pb = visual::CustomProgressBar::new(total as u64);
    pb.set_message("verificando");
    let mut failures = Vec::new();
    while server.remaining() > 0 {
        let data = server.next_puzzle()?;
        let id = data.puzzle.id;
        if let Err(e) = check_one(&data) {
            pb.log(&format!("puzzle {id}: {e:#}"));
            failures.push((id, format!("{e:#}")));
        }
        pb.inc(1);
    }
    pb.finish_with_message("concluído");
    visual::render_check_summary(total, &failures);
    if !failures.is_empty() {
        bail!("{} puzzles com problemas", failures.len());
    }
    Ok(())
}

fn import(args: ImportArgs) -> Result<()> {
    let pgn = fs::read_to_string(&args.pgn).with_context(|| format!("abrir {}", args.pgn.display()))?;
    let tree_parts = tree::parts_from_pgn(&pgn)?;
    let lines: Lines = serde_json::from_str(&args.lines).context("linhas inválidas")?;
    let color = tree_parts.last().map(|n| n.turn()).context("partida sem posição")?;
    let data = PuzzleData {
        puzzle: Puzzle { id: args.id, enabled: true, vote: 0, color, lines, branch: None },
        game: GameData { tree_parts },
        user: None,
        voted: None,
    };
    data.check()?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// Ponto de entrada principal do programa
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(&cli.log_level);

    match cli.command {
        Command::Play(args) => play(args).await,
        Command::Check { batch } => check(batch),
        Command::Import(args) => import(args),
    }
}
