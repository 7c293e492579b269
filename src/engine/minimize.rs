//! Minimization of freshly learnt clauses.
//!
//! Two ideas, both checked on a scratch partial-assignment domain: a
//! literal whose negation is implied by the negations of the remaining
//! literals is dropped, and when assuming the negations runs into a
//! conflict the unassumed tail is dropped wholesale.

use crate::{
    engine::Solver,
    literal::Lit,
    qcnf::ClauseId,
};
use rand::seq::SliceRandom;
use tracing::debug;

impl Solver {
    /// Tries to shrink a freshly learnt clause. Returns the replacement
    /// clause if any literal was removed.
    pub(crate) fn minimize_clause(&mut self, cid: ClauseId) -> Option<ClauseId> {
        assert_eq!(self.skolem.unique_consequence(cid), None);
        assert!(self.minimization_pa.push_count() == 0);

        let lits = self.qcnf[cid].lits().to_vec();
        if lits.len() <= 1 || self.skolem.clause_satisfied(&self.qcnf, cid) {
            return None;
        }

        let mut permutation: Vec<usize> = (0..lits.len()).collect();
        permutation.shuffle(&mut self.rng);

        let mut to_remove: Vec<Lit> = Vec::new();
        self.minimization_pa.push();
        for i in 0..lits.len() - 1 {
            let lit = lits[permutation[i]];
            let val = self.minimization_pa.value(!lit);
            if val == 0 {
                self.minimization_pa.assign(&self.qcnf, !lit, None);
                self.minimization_pa.propagate(&self.qcnf);
            } else if val == 1 {
                debug!("removing implied literal {lit} from clause {cid}");
                to_remove.push(lit);
            }
            if val == -1 || self.minimization_pa.is_conflicted() {
                // a subset of the assumptions already conflicts; the
                // unassumed tail cannot be needed
                for &j in &permutation[i + 1..] {
                    to_remove.push(lits[j]);
                }
                break;
            }
        }
        self.minimization_pa.pop();

        if to_remove.is_empty() {
            return None;
        }
        let removed = to_remove.len();
        for &lit in lits.iter().filter(|l| !to_remove.contains(l)) {
            self.qcnf.add_lit(lit);
        }
        match self.qcnf.close_clause(false) {
            Some(new_cid) => {
                debug!("clause minimization removed {removed} of {} literals", lits.len());
                self.stats.successful_conflict_clause_minimizations += removed as u64;
                self.qcnf.retire_clause(cid);
                // freed literals may have become pure
                for lit in to_remove {
                    self.skolem.schedule_pure_check(&self.qcnf, lit.var());
                }
                Some(new_cid)
            }
            None => {
                // the shrunk clause already exists; keep the original
                debug!("clause minimization led to a duplicate");
                for lit in lits {
                    self.skolem.schedule_pure_check(&self.qcnf, lit.var());
                }
                None
            }
        }
    }
}
