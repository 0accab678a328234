pub mod booking_dtos;
