// Configurações centralizadas do controlador de puzzles

use shakmaty::Role;

// Motor de análise (ceval)
pub const DEFAULT_DEPTH: u8 = 18;                  // Profundidade padrão da análise local
pub const DEFAULT_MULTIPV: usize = 1;              // Linhas principais pedidas ao motor
pub const THREADS: u32 = 2;                        // Threads do Stockfish
pub const HASH_MB: u32 = 256;                      // Hash em MB do Stockfish
pub const ENGINE_TIMEOUT_SECS: u64 = 10;           // Timeout global de uma análise
pub const TABLEBASE_MAX_PIECES: usize = 7;         // Máximo de peças para consultar Syzygy

// Histórico do usuário
pub const RECENT_MAX: usize = 10;                  // Rodadas recentes mantidas em PuzzleUser.recent

// Promoção: ordem em que as peças são oferecidas ao usuário
pub const PROMOTION_ROLES: [Role; 4] = [Role::Queen, Role::Knight, Role::Rook, Role::Bishop];

// Tabuleiro
pub const DEFAULT_ANIMATION_MS: u32 = 250;         // Duração padrão da animação de peças

// Validação de linhas
pub const MAX_LINES_DEPTH: usize = 64;             // Profundidade máxima aceita na árvore de linhas

// Servidor local (lote em JSON)
pub const DEFAULT_RATING: i32 = 1500;              // Rating de um usuário anônimo
pub const VIEW_SOLUTION_DELAY_SECS: u64 = 4;       // Espera até liberar "ver solução"
