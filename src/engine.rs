// src/engine.rs
// ---------------------------------------------------------------------------
// Motor UCI externo (Stockfish) + tablebase opcional, usado pelo ceval
// ---------------------------------------------------------------------------

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace, warn};
use shakmaty::{uci::UciMove, CastlingMode, Chess, Color, Position};
use shakmaty_syzygy::{AmbiguousWdl, Tablebase};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
    time::{timeout, Duration},
};

use crate::{
    ceval::{threat_fen, CevalRequest, ClientEval, Pv, Score},
    config::{ENGINE_TIMEOUT_SECS, HASH_MB, TABLEBASE_MAX_PIECES, THREADS},
    tree,
};

const ENGINE_TIMEOUT: Duration = Duration::from_secs(ENGINE_TIMEOUT_SECS);

/// Origem da análise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOrigin { Engine, Syzygy }

/// Informações de cada linha de análise (score do ponto de vista de quem joga)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInfo {
    pub score:   Score,
    pub depth:   u8,
    pub pv:      Vec<String>,
    pub origin:  AnalysisOrigin,
    pub multipv: usize,
}

/// Engine UCI + tablebase
pub struct Engine {
    child:           Child,
    stdin:           Arc<Mutex<ChildStdin>>,
    stdout:          Arc<Mutex<BufReader<ChildStdout>>>,
    syzygy:          Option<Tablebase<Chess>>,
    current_multipv: usize,
    timeout:         Duration,
}

impl Drop for Engine { fn drop(&mut self) { let _ = self.child.start_kill(); }}

impl Engine {
    /// Cria engine com tablebase opcional
    pub async fn new_with_syzygy(path: &str, tb_dirs: &[PathBuf]) -> Result<Self> {
        let mut child = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("iniciar motor '{path}'"))?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("stdin do motor indisponível"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("stdout do motor indisponível"))?;

        let syzygy = if tb_dirs.is_empty() {
            None
        } else {
            let mut tb = Tablebase::<Chess>::new();
            for d in tb_dirs {
                let n = tb.add_directory(d).with_context(|| format!("tablebase em {}", d.display()))?;
                debug!("{n} tabelas carregadas de {}", d.display());
            }
            Some(tb)
        };

        let engine = Engine {
            child,
            stdin: Arc::new(Mutex::new(stdin)),
            stdout: Arc::new(Mutex::new(BufReader::new(stdout))),
            syzygy,
            current_multipv: 0,
            timeout: ENGINE_TIMEOUT,
        };
        engine.cmd("uci").await?;
        engine.wait_for("uciok").await?;
        engine.cmd(&format!("setoption name Threads value {}", THREADS)).await?;
        engine.cmd(&format!("setoption name Hash value {}", HASH_MB)).await?;
        engine.wait_ready().await?;
        Ok(engine)
    }

    /// Cria engine sem tablebase
    pub async fn new(path: &str) -> Result<Self> {
        Self::new_with_syzygy(path, &[]).await
    }

    /// Tempo máximo de uma análise
    pub fn set_timeout(&mut self, limit: Duration) {
        self.timeout = limit;
    }

    /// Lê linhas até uma que comece por `token`
    async fn wait_for(&self, token: &str) -> Result<()> {
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = {
                let mut r = self.stdout.lock().await;
                timeout(ENGINE_TIMEOUT, r.read_line(&mut buf)).await??
            };
            if n == 0 { bail!("motor encerrou antes de '{token}'"); }
            if buf.split_whitespace().next() == Some(token) { return Ok(()); }
        }
    }

    /// Envia "isready" e espera por "readyok"; essencial após setoption e ucinewgame
    #[inline]
    async fn wait_ready(&self) -> Result<()> {
        self.cmd("isready").await?;
        self.wait_for("readyok").await
    }

    /// Envia comando UCI
    #[inline]
    async fn cmd(&self, c: &str) -> Result<()> {
        trace!("uci > {c}");
        let mut w = self.stdin.lock().await;
        w.write_all(c.as_bytes()).await?;
        w.write_all(b"\n").await?;
        w.flush().await?;
        Ok(())
    }

    /// Limpa o estado interno do motor entre puzzles
    pub async fn new_game(&mut self) -> Result<()> {
        self.cmd("ucinewgame").await?;
        self.wait_ready().await
    }

    /// Consulta a tablebase, se houver e a posição tiver poucas peças
    fn probe_syzygy(&self, pos: &Chess) -> Option<AnalysisInfo> {
        let tb = self.syzygy.as_ref()?;
        if pos.board().occupied().count() > TABLEBASE_MAX_PIECES { return None; }
        let score = match tb.probe_wdl(pos).ok()? {
            AmbiguousWdl::Win  => Score::Mate(1),
            AmbiguousWdl::Loss => Score::Mate(-1),
            _                  => Score::Cp(0),
        };
        Some(AnalysisInfo { score, depth: 0, pv: Vec::new(), origin: AnalysisOrigin::Syzygy, multipv: 1 })
    }

    /// Analisa um FEN (streaming parse, última linha por multipv)
    pub async fn analyze_fen(&mut self, fen: &str, depth: u8, multipv: usize) -> Result<Vec<AnalysisInfo>> {
        let pos = tree::parse_position(fen)?;
        if let Some(info) = self.probe_syzygy(&pos) {
            return Ok(vec![info]);
        }
        // seta multipv apenas se mudou
        if multipv != self.current_multipv {
            self.cmd(&format!("setoption name MultiPV value {}", multipv)).await?;
            self.current_multipv = multipv;
        }
        let fut = async {
            self.cmd(&format!("position fen {}", fen)).await?;
            self.cmd(&format!("go depth {}", depth)).await?;
            let mut map = HashMap::<usize, AnalysisInfo>::new();
            let mut line = String::new();
            loop {
                line.clear();
                let n = self.stdout.lock().await.read_line(&mut line).await?;
                if n == 0 || line.starts_with("bestmove") { break; }
                if line.starts_with("info ") && line.contains(" pv ") {
                    if let Some(info) = parse_info_line(&line, &pos) {
                        let keep = map.get(&info.multipv).map_or(true, |e| info.depth >= e.depth);
                        if keep { map.insert(info.multipv, info); }
                    }
                }
            }
            let mut res: Vec<_> = map.into_values().collect();
            res.sort_by_key(|i| i.multipv);
            Ok::<_, anyhow::Error>(res)
        };
        match timeout(self.timeout, fut).await {
            Ok(inner) => inner,
            Err(_) => {
                // interrompe a busca e descarta a saída dela antes do próximo pedido
                warn!("análise excedeu {:?}; interrompendo o motor", self.timeout);
                self.cmd("stop").await?;
                self.wait_for("bestmove").await?;
                self.wait_ready().await?;
                Err(anyhow!("análise excedeu o tempo limite"))
            }
        }
    }

    /// Executa um pedido do ceval e devolve a avaliação do nó
    pub async fn run(&mut self, req: &CevalRequest) -> Result<ClientEval> {
        let fen = if req.threat { threat_fen(&req.fen) } else { req.fen.clone() };
        let turn = tree::parse_position(&fen)?.turn();
        let infos = self.analyze_fen(&fen, req.depth, req.multipv).await?;
        debug!("ceval {}: {} linhas", if req.threat { "ameaça" } else { "posição" }, infos.len());
        Ok(to_client_eval(&req.fen, turn, &infos))
    }
}

/// Converte as linhas do motor em ClientEval, com score do ponto de vista das brancas
pub fn to_client_eval(fen: &str, turn: Color, infos: &[AnalysisInfo]) -> ClientEval {
    let pov = |s: Score| match (turn, s) {
        (Color::White, s) => s,
        (Color::Black, Score::Cp(c)) => Score::Cp(-c),
        (Color::Black, Score::Mate(m)) => Score::Mate(-m),
    };
    let pvs: Vec<Pv> = infos.iter().map(|i| Pv::new(i.pv.clone(), pov(i.score))).collect();
    let (cp, mate) = match pvs.first() {
        Some(pv) => (pv.cp, pv.mate),
        None => (None, None),
    };
    ClientEval {
        fen: fen.to_string(),
        depth: infos.iter().map(|i| i.depth).max().unwrap_or(0),
        cp,
        mate,
        pvs,
    }
}

/// Parser UCI "info ... pv ..."; a PV é cortada no primeiro lance ilegal
fn parse_info_line(line: &str, base: &Chess) -> Option<AnalysisInfo> {
    let mut parts = line.split_whitespace();
    let mut depth = 0;
    let mut score = None;
    let mut multipv = 1;
    while let Some(tok) = parts.next() {
        match tok {
            "depth"   => if let Some(d) = parts.next().and_then(|s| s.parse().ok()) { depth = d },
            "multipv" => if let Some(m) = parts.next().and_then(|s| s.parse().ok()) { multipv = m },
            "score"   => if let Some(kind) = parts.next() {
                if let Some(v) = parts.next().and_then(|s| s.parse().ok()) {
                    score = match kind {
                        "cp"   => Some(Score::Cp(v)),
                        "mate" => Some(Score::Mate(v)),
                        _      => None,
                    };
                }
            },
            "pv" => break,
            _    => {},
        }
    }
    let score = score?;
    let mut tmp = base.clone();
    let mut pv = Vec::new();
    for tok in parts {
        let Ok(uci) = UciMove::from_ascii(tok.as_bytes()) else { break };
        let Ok(m) = uci.to_move(&tmp) else { break };
        pv.push(UciMove::from_move(&m, CastlingMode::Standard).to_string());
        tmp.play_unchecked(&m);
    }
    if pv.is_empty() { return None; }
    Some(AnalysisInfo { score, depth, pv, origin: AnalysisOrigin::Engine, multipv })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_info_lines() {
        let pos = Chess::default();
        let info = parse_info_line(
            "info depth 12 seldepth 18 multipv 2 score cp -31 nodes 1000 pv e2e4 e7e5 g1f3",
            &pos,
        )
        .unwrap();
        assert_eq!(info.depth, 12);
        assert_eq!(info.multipv, 2);
        assert_eq!(info.score, Score::Cp(-31));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn truncates_illegal_pv_and_requires_score() {
        let pos = Chess::default();
        let info = parse_info_line("info depth 3 score mate 2 pv e2e4 e2e4", &pos).unwrap();
        assert_eq!(info.pv, vec!["e2e4"]);
        assert!(parse_info_line("info depth 3 pv e2e4", &pos).is_none());
        assert!(parse_info_line("info depth 3 score cp 10 pv e2e5", &pos).is_none());
    }

    #[test]
    fn client_eval_is_from_white_point_of_view() {
        let infos = vec![
            AnalysisInfo { score: Score::Cp(50), depth: 10, pv: vec!["e7e5".into()], origin: AnalysisOrigin::Engine, multipv: 1 },
            AnalysisInfo { score: Score::Mate(-3), depth: 11, pv: vec!["f7f6".into()], origin: AnalysisOrigin::Engine, multipv: 2 },
        ];
        let eval = to_client_eval("fen", Color::Black, &infos);
        assert_eq!(eval.cp, Some(-50));
        assert_eq!(eval.depth, 11);
        assert_eq!(eval.pvs[1].mate, Some(3));
        assert_eq!(eval.best(), Some("e7e5"));
    }

    /// Motor falso: responde "go depth 99" só depois do próximo comando (stop)
    #[cfg(unix)]
    fn slow_engine_script() -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = std::env::temp_dir().join(format!("motor-lento-{}.sh", std::process::id()));
        let script = r#"#!/bin/sh
searching=""
while read -r cmd; do
  if [ -n "$searching" ]; then echo "bestmove e2e4"; searching=""; fi
  case "$cmd" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    "go depth 99") echo "info depth 1 score cp 5 pv e2e4"; searching=1 ;;
    go*) echo "info depth 5 score cp 7 pv d2d4"; echo "bestmove d2d4" ;;
  esac
done
"#;
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_search_is_stopped_before_the_next_request() {
        const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let script = slow_engine_script();
        let mut engine = Engine::new(script.to_str().unwrap()).await.unwrap();
        engine.set_timeout(Duration::from_millis(200));

        assert!(engine.analyze_fen(START, 99, 1).await.is_err());

        // a resposta atrasada da busca interrompida não vaza para este pedido
        let infos = engine.analyze_fen(START, 5, 1).await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].pv, vec!["d2d4"]);
        assert_eq!(infos[0].score, Score::Cp(7));
        let _ = std::fs::remove_file(script);
    }
}
