//! Shared fixture: a two-module repository with eight revisions
#![allow(dead_code)]

use revision_crawler::crawler::RevisionCrawler;
use revision_crawler::repository::{MemoryOpener, MemoryRepository, MemoryRepositoryBuilder};

pub const LOCATION: &str = "mem://fixture";

/// Largest file size under which every fixture file but two stays
pub const SIZE_LIMIT: u64 = 80;

const LONG_WATCHLIST: &str = "Alien\nBlade Runner\nHeat\nJaws\nMetropolis\nSolaris\n\
    Stalker\nThe Thing\nVertigo\nZodiac\n";
const LONG_BOOKLIST: &str = "Dune\nEmma\nHamlet\nIvanhoe\nLolita\nMiddlemarch\nNostromo\nPersuasion\n\
    Rebecca\nUlysses\nWalden\n";

/// The fixture history, open for extra failure injection
pub fn history() -> MemoryRepositoryBuilder {
    MemoryRepository::builder(LOCATION)
        .commit("alice", "Create module1 with a watchlist", |txn| {
            txn.add_dir("/module1")?;
            txn.add_dir("/module1/trunk")?;
            txn.add_file("/module1/trunk/watchlist.txt", "Alien\nHeat\n")?;
            Ok(())
        })
        .expect("revision 1")
        .commit("bob", "Create module2 with a playlist", |txn| {
            txn.add_dir("/module2")?;
            txn.add_dir("/module2/trunk")?;
            txn.add_file("/module2/trunk/playlist.txt", "Blue Monday\nHeroes\n")?;
            Ok(())
        })
        .expect("revision 2")
        .commit("alice", "Add notes and ideas", |txn| {
            txn.modify_file("/module1/trunk/watchlist.txt", "Alien\nHeat\nJaws\n")?;
            txn.add_file("/module1/trunk/notes.txt", "Watch on Friday\n")?;
            txn.add_file("/module1/trunk/ideas.txt", "Film club\n")?;
            Ok(())
        })
        .expect("revision 3")
        .commit("bob", "Start a booklist", |txn| {
            txn.add_file("/module2/trunk/booklist.txt", "Dune\nEmma\n")?;
            Ok(())
        })
        .expect("revision 4")
        .commit("alice", "Extend watchlist", |txn| {
            txn.modify_file(
                "/module1/trunk/watchlist.txt",
                "Alien\nHeat\nJaws\nZodiac\n",
            )?;
            Ok(())
        })
        .expect("revision 5")
        .commit("bob", "More books and a todo", |txn| {
            txn.modify_file("/module2/trunk/booklist.txt", "Dune\nEmma\nHamlet\n")?;
            txn.add_file("/module1/trunk/todo.txt", "Return the DVDs\n")?;
            Ok(())
        })
        .expect("revision 6")
        .commit("alice", "Drop the playlist, long watchlist", |txn| {
            txn.delete("/module2/trunk/playlist.txt")?;
            txn.modify_file("/module1/trunk/watchlist.txt", LONG_WATCHLIST)?;
            Ok(())
        })
        .expect("revision 7")
        .commit("bob", "Long booklist", |txn| {
            txn.modify_file("/module2/trunk/booklist.txt", LONG_BOOKLIST)?;
            Ok(())
        })
        .expect("revision 8")
}

pub fn fixture() -> MemoryRepository {
    history().build()
}

pub fn crawler_for(repository: MemoryRepository) -> RevisionCrawler<MemoryOpener> {
    RevisionCrawler::new(MemoryOpener::new().with(repository))
}

pub fn crawler() -> RevisionCrawler<MemoryOpener> {
    crawler_for(fixture())
}
